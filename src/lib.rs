//! # DDP Stream
//!
//! An auto-reconnecting client message stream for realtime application
//! servers speaking SockJS.
//!
//! ## Features
//!
//! - Automatic reconnection with jittered exponential backoff
//! - Heartbeat monitoring of silent links
//! - Connect timeouts for stalled handshakes
//! - Server identity tracking with `update_available` notifications
//! - `reset` notifications on every fresh connection
//! - Observable connection status
//! - Pluggable transports; SockJS over websocket or xhr-polling by default
//!
//! ## Example
//!
//! ```ignore
//! use ddp_stream::{ClientStream, StreamOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stream = ClientStream::new("localhost:3000", StreamOptions::default())?;
//!
//!     let sender = stream.clone();
//!     stream.on_reset(move || {
//!         sender.send(r#"{"msg":"connect","version":"1","support":["1"]}"#);
//!     });
//!     stream.on_message(|payload| {
//!         println!("Received: {}", payload);
//!     });
//!
//!     let mut status = stream.subscribe_status();
//!     status.wait_for(|s| s.connected).await?;
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod endpoint;
pub mod events;
pub mod protocol;
pub mod transports;
pub mod utils;

mod error;
mod options;

// Re-exports
pub use connection::{
    BackoffPolicy, ClientStream, ConnectionState, ConstantBackoff, DisconnectOptions,
    ExponentialBackoff, ReconnectOptions, StreamBuilder, StreamStatus,
};
pub use endpoint::{to_sockjs_url, to_websocket_url};
pub use error::{Result, StreamError};
pub use events::{EventDispatcher, EventKind, StreamEvent};
pub use options::{SiteConfig, StreamOptions};
pub use protocol::{Handshake, SockJsFrame};
#[cfg(feature = "native")]
pub use transports::SockJsTransport;
pub use transports::{
    CloseCallback, ErrorCallback, HeartbeatCallback, MessageCallback, Transport,
    TransportCallbacks, TransportFactory, TransportOptions,
};
