//! Example usage of the ddp-stream client library.
//!
//! Run with: cargo run --example basic -- localhost:3000

use ddp_stream::{ClientStream, StreamOptions};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "localhost:3000".to_string());

    let options = StreamOptions::new()
        .heartbeat_timeout(Duration::from_secs(60))
        .debug(true);

    let stream = ClientStream::new(url, options)?;

    // Every fresh connection starts a new session; say hello each time.
    let sender = stream.clone();
    stream.on_reset(move || {
        println!("[Reset] Connected, starting session");
        sender.send(r#"{"msg":"connect","version":"1","support":["1"]}"#);
    });

    stream.on_message(|payload| {
        println!("[Message] {}", payload);
    });

    stream.on_update_available(|server_id| {
        println!("[Update] Server is now running build {}", server_id);
    });

    // Report status changes until Ctrl+C
    let mut status = stream.subscribe_status();
    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                println!(
                    "[Status] {} (connected: {}, retries: {})",
                    current.status, current.connected, current.retry_count
                );
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
                break;
            }
        }
    }

    stream.disconnect();
    Ok(())
}
