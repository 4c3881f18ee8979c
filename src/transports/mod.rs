//! Transport implementations.
//!
//! The stream talks to its socket only through the [`Transport`] trait, so any
//! message-oriented socket can be plugged in through a [`TransportFactory`].
//! With the `native` feature the crate ships [`SockJsTransport`], which speaks
//! SockJS over websocket (tokio-tungstenite) or xhr-polling (reqwest).

mod transport;

pub use transport::{
    CloseCallback, ErrorCallback, HeartbeatCallback, MessageCallback, Transport,
    TransportCallbacks, TransportFactory, TransportOptions, POLLING_PROTOCOLS,
    WEBSOCKET_PROTOCOL,
};

#[cfg(feature = "native")]
mod sockjs;
#[cfg(feature = "native")]
mod websocket;
#[cfg(feature = "native")]
mod xhr_polling;

#[cfg(feature = "native")]
pub use sockjs::SockJsTransport;

/// Create the default transport
#[cfg(feature = "native")]
pub fn create_default_transport() -> Box<dyn Transport> {
    Box::new(SockJsTransport::new())
}

/// Factory producing the default transport for every connection attempt
#[cfg(feature = "native")]
pub fn default_transport_factory() -> TransportFactory {
    std::sync::Arc::new(create_default_transport)
}
