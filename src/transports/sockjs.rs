//! Default SockJS transport.

use async_trait::async_trait;
use tracing::{debug, info};

use super::transport::{
    CloseCallback, ErrorCallback, HeartbeatCallback, MessageCallback, Transport,
    TransportCallbacks, TransportOptions,
};
use super::websocket::{self, WebSocketLink};
use super::xhr_polling::XhrPollingLink;
use crate::error::{Result, StreamError};
use crate::protocol::sockjs::session_url;

/// Protocols this transport can speak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Protocol {
    WebSocket,
    XhrPolling,
}

impl Protocol {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "websocket" => Some(Self::WebSocket),
            "xhr-polling" => Some(Self::XhrPolling),
            _ => None,
        }
    }

    /// First supported protocol in whitelist order
    fn select(whitelist: &[String]) -> Option<Self> {
        whitelist.iter().find_map(|name| Self::from_name(name))
    }
}

enum Link {
    WebSocket(WebSocketLink),
    XhrPolling(XhrPollingLink),
}

/// SockJS client socket speaking websocket or xhr-polling.
///
/// Opening picks the first protocol of the whitelist this transport
/// implements and starts a new SockJS session below the given base URL.
pub struct SockJsTransport {
    callbacks: TransportCallbacks,
    link: Option<Link>,
}

impl SockJsTransport {
    pub fn new() -> Self {
        Self {
            callbacks: TransportCallbacks::new(),
            link: None,
        }
    }
}

impl Default for SockJsTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for SockJsTransport {
    async fn open(&mut self, url: &str, options: &TransportOptions) -> Result<()> {
        if self.link.is_some() {
            return Err(StreamError::invalid_state("Already open"));
        }

        let protocol = Protocol::select(&options.protocols_whitelist).ok_or_else(|| {
            StreamError::config(format!(
                "no supported protocol in whitelist {:?}",
                options.protocols_whitelist
            ))
        })?;

        let session = session_url(url);
        if options.debug {
            debug!("Opening SockJS session {} over {:?}", session, protocol);
        }

        let link = match protocol {
            Protocol::WebSocket => {
                let endpoint = websocket::session_endpoint(&session)?;
                info!("Connecting to {}", endpoint);
                Link::WebSocket(WebSocketLink::spawn(endpoint, self.callbacks.clone()))
            }
            Protocol::XhrPolling => {
                info!("Polling {}", session);
                Link::XhrPolling(XhrPollingLink::spawn(&session, self.callbacks.clone())?)
            }
        };

        self.link = Some(link);
        Ok(())
    }

    async fn close(&mut self) {
        match self.link.take() {
            Some(Link::WebSocket(link)) => link.close(),
            Some(Link::XhrPolling(link)) => link.close(),
            None => {}
        }
    }

    async fn send(&self, data: &str) -> Result<()> {
        match &self.link {
            Some(Link::WebSocket(link)) => link.send(data),
            Some(Link::XhrPolling(link)) => link.send(data),
            None => Err(StreamError::invalid_state("Not open")),
        }
    }

    fn is_open(&self) -> bool {
        match &self.link {
            Some(Link::WebSocket(link)) => link.is_alive(),
            Some(Link::XhrPolling(link)) => link.is_alive(),
            None => false,
        }
    }

    fn on_message(&mut self, callback: MessageCallback) {
        self.callbacks.set_message(callback);
    }

    fn on_close(&mut self, callback: CloseCallback) {
        self.callbacks.set_close(callback);
    }

    fn on_error(&mut self, callback: ErrorCallback) {
        self.callbacks.set_error(callback);
    }

    fn on_heartbeat(&mut self, callback: HeartbeatCallback) {
        self.callbacks.set_heartbeat(callback);
    }

    fn clear_callbacks(&mut self) {
        self.callbacks.clear();
    }
}
