//! SockJS websocket driver using tokio-tungstenite.

use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use super::transport::TransportCallbacks;
use crate::error::{Result, StreamError};
use crate::protocol::SockJsFrame;

/// Command to send to the WebSocket task
enum WriteCommand {
    SendText(String),
    Close,
}

/// Turn a SockJS session URL (`http(s)://…/<server>/<session>`) into its
/// websocket endpoint (`ws(s)://…/<server>/<session>/websocket`).
pub(crate) fn session_endpoint(session_url: &str) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/websocket", session_url.trim_end_matches('/')))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(StreamError::config(format!(
                "unsupported scheme '{}' for websocket endpoint",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| StreamError::config(format!("cannot switch {} to {}", url, scheme)))?;
    Ok(url)
}

/// A running websocket session
pub(crate) struct WebSocketLink {
    write_tx: mpsc::UnboundedSender<WriteCommand>,
    connected: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl WebSocketLink {
    /// Spawn the connection task. Returns immediately.
    pub(crate) fn spawn(url: Url, callbacks: TransportCallbacks) -> Self {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(run(
            url,
            callbacks,
            write_rx,
            connected.clone(),
            finished.clone(),
        ));

        Self {
            write_tx,
            connected,
            finished,
            task,
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        !self.finished.load(Ordering::SeqCst)
    }

    /// Queue a payload. Payloads queued before the handshake completes are
    /// written once it does.
    pub(crate) fn send(&self, data: &str) -> Result<()> {
        let frame = SockJsFrame::encode_messages(&[data])?;
        self.write_tx
            .send(WriteCommand::SendText(frame))
            .map_err(|_| StreamError::invalid_state("websocket session has ended"))
    }

    pub(crate) fn close(self) {
        if self.connected.load(Ordering::SeqCst) {
            let _ = self.write_tx.send(WriteCommand::Close);
        } else {
            self.task.abort();
        }
        self.finished.store(true, Ordering::SeqCst);
    }
}

async fn run(
    url: Url,
    callbacks: TransportCallbacks,
    mut write_rx: mpsc::UnboundedReceiver<WriteCommand>,
    connected: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
) {
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            error!("WebSocket connection to {} failed: {:?}", url, e);
            finished.store(true, Ordering::SeqCst);
            callbacks.error(format!("Connection failed: {}", e));
            callbacks.close(None, Some("connection failed".to_string()));
            return;
        }
    };

    info!("WebSocket connected to {}", url);
    connected.store(true, Ordering::SeqCst);

    let (mut writer, mut reader) = ws_stream.split();

    loop {
        tokio::select! {
            cmd = write_rx.recv() => match cmd {
                Some(WriteCommand::SendText(text)) => {
                    debug!("Sending frame: {}", text);
                    if let Err(e) = writer.send(Message::Text(text)).await {
                        error!("Write error: {:?}", e);
                        callbacks.error(format!("Write error: {}", e));
                        callbacks.close(None, Some("write failed".to_string()));
                        break;
                    }
                }
                Some(WriteCommand::Close) | None => {
                    debug!("Closing websocket");
                    let _ = writer.send(Message::Close(None)).await;
                    break;
                }
            },
            message = reader.next() => match message {
                Some(Ok(Message::Text(text))) => match SockJsFrame::decode(&text) {
                    Ok(frame) => {
                        if !callbacks.deliver(frame) {
                            let _ = writer.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    Err(e) => warn!("Ignoring undecodable frame {:?}: {}", text, e),
                },
                Some(Ok(Message::Close(frame))) => {
                    info!("Received close frame");
                    let (code, reason) = match frame {
                        Some(cf) => (Some(cf.code.into()), Some(cf.reason.to_string())),
                        None => (None, None),
                    };
                    callbacks.close(code, reason);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("WebSocket receive error: {:?}", e);
                    callbacks.error(format!("Receive error: {}", e));
                    callbacks.close(None, Some("receive failed".to_string()));
                    break;
                }
                None => {
                    info!("WebSocket stream ended");
                    callbacks.close(None, Some("stream ended".to_string()));
                    break;
                }
            }
        }
    }

    finished.store(true, Ordering::SeqCst);
    debug!("WebSocket task ended");
}
