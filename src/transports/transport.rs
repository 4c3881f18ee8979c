//! Transport trait definition.

use crate::error::Result;
use crate::protocol::SockJsFrame;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

/// Callback for inbound messages
pub type MessageCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Callback for a closed socket: close code and reason when known
pub type CloseCallback = Box<dyn Fn(Option<u16>, Option<String>) + Send + Sync>;

/// Callback for transport errors
pub type ErrorCallback = Box<dyn Fn(String) + Send + Sync>;

/// Callback for explicit heartbeat frames
pub type HeartbeatCallback = Box<dyn Fn() + Send + Sync>;

/// Creates a fresh, unopened socket for every connection attempt
pub type TransportFactory = Arc<dyn Fn() -> Box<dyn Transport> + Send + Sync>;

/// Name of the websocket protocol in a whitelist
pub const WEBSOCKET_PROTOCOL: &str = "websocket";

/// Polling protocols, safest first
pub const POLLING_PROTOCOLS: [&str; 4] = [
    "xdr-polling",
    "xhr-polling",
    "iframe-xhr-polling",
    "jsonp-polling",
];

/// Options handed to a transport when it is opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportOptions {
    pub debug: bool,
    /// Protocols the transport may use, in order of preference
    pub protocols_whitelist: Vec<String>,
}

impl TransportOptions {
    /// Build options from the capabilities of the embedding environment.
    ///
    /// Streaming protocols other than websocket are never whitelisted.
    pub fn for_capabilities(websockets_supported: bool, debug: bool) -> Self {
        let mut protocols_whitelist = Vec::with_capacity(POLLING_PROTOCOLS.len() + 1);
        if websockets_supported {
            protocols_whitelist.push(WEBSOCKET_PROTOCOL.to_string());
        }
        protocols_whitelist.extend(POLLING_PROTOCOLS.iter().map(|p| p.to_string()));

        Self {
            debug,
            protocols_whitelist,
        }
    }
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::for_capabilities(true, false)
    }
}

/// A single message-oriented socket.
///
/// Sockets are single use: the stream creates one per connection attempt
/// through a [`TransportFactory`], clears its callbacks and closes it before
/// creating the next one. `open` must not wait for the network; failures are
/// reported through `on_error` and `on_close`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start connecting to `url`
    async fn open(&mut self, url: &str, options: &TransportOptions) -> Result<()>;

    /// Close the socket
    async fn close(&mut self);

    /// Send a text payload
    async fn send(&self, data: &str) -> Result<()>;

    /// Check if the socket is open and not yet closed
    fn is_open(&self) -> bool;

    /// Set message callback
    fn on_message(&mut self, callback: MessageCallback);

    /// Set close callback
    fn on_close(&mut self, callback: CloseCallback);

    /// Set error callback
    fn on_error(&mut self, callback: ErrorCallback);

    /// Set heartbeat callback. Transports without heartbeat frames ignore it.
    fn on_heartbeat(&mut self, _callback: HeartbeatCallback) {}

    /// Drop every callback so nothing more is delivered from this socket
    fn clear_callbacks(&mut self);
}

/// Shared callback slots for transports whose I/O runs on spawned tasks.
#[derive(Clone, Default)]
pub struct TransportCallbacks {
    on_message: Arc<RwLock<Option<MessageCallback>>>,
    on_close: Arc<RwLock<Option<CloseCallback>>>,
    on_error: Arc<RwLock<Option<ErrorCallback>>>,
    on_heartbeat: Arc<RwLock<Option<HeartbeatCallback>>>,
}

impl TransportCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_message(&self, callback: MessageCallback) {
        *self.on_message.write() = Some(callback);
    }

    pub fn set_close(&self, callback: CloseCallback) {
        *self.on_close.write() = Some(callback);
    }

    pub fn set_error(&self, callback: ErrorCallback) {
        *self.on_error.write() = Some(callback);
    }

    pub fn set_heartbeat(&self, callback: HeartbeatCallback) {
        *self.on_heartbeat.write() = Some(callback);
    }

    pub fn clear(&self) {
        *self.on_message.write() = None;
        *self.on_close.write() = None;
        *self.on_error.write() = None;
        *self.on_heartbeat.write() = None;
    }

    pub fn message(&self, data: &str) {
        if let Some(ref callback) = *self.on_message.read() {
            callback(data);
        }
    }

    pub fn close(&self, code: Option<u16>, reason: Option<String>) {
        if let Some(ref callback) = *self.on_close.read() {
            callback(code, reason);
        }
    }

    pub fn error(&self, error: String) {
        if let Some(ref callback) = *self.on_error.read() {
            callback(error);
        }
    }

    pub fn heartbeat(&self) {
        if let Some(ref callback) = *self.on_heartbeat.read() {
            callback();
        }
    }

    /// Route a decoded SockJS frame to the matching callback.
    ///
    /// Returns `false` once the frame closed the session.
    pub fn deliver(&self, frame: SockJsFrame) -> bool {
        match frame {
            SockJsFrame::Open => {
                trace!("SockJS session opened");
                true
            }
            SockJsFrame::Heartbeat => {
                self.heartbeat();
                true
            }
            SockJsFrame::Messages(messages) => {
                for message in &messages {
                    self.message(message);
                }
                true
            }
            SockJsFrame::Close { code, reason } => {
                self.close(Some(code), Some(reason));
                false
            }
        }
    }
}
