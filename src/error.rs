//! Error types for the ddp-stream client library.

use thiserror::Error;

/// Result type alias for stream operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Main error type for the client stream.
///
/// Connection failures never surface through this type once a stream is
/// running; they are reported as status changes instead. These errors come
/// from construction, option validation, the wire codecs and the transports.
#[derive(Error, Debug, Clone)]
pub enum StreamError {
    #[error("Connection error: {message}")]
    ConnectionError { message: String },

    #[error("Transport error: {message}")]
    TransportError { message: String },

    #[error("Protocol error: {message}")]
    ProtocolError { message: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Invalid event: {message}")]
    InvalidEvent { message: String },

    #[error("WebSocket error: {message}")]
    WebSocketError { message: String },

    #[error("HTTP error: {message}")]
    HttpError { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Serialization error: {message}")]
    SerializationError { message: String },
}

impl StreamError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: msg.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError {
            message: msg.into(),
        }
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::ProtocolError {
            message: msg.into(),
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState {
            message: msg.into(),
        }
    }

    pub fn invalid_event(msg: impl Into<String>) -> Self {
        Self::InvalidEvent {
            message: msg.into(),
        }
    }

    pub fn websocket(msg: impl Into<String>) -> Self {
        Self::WebSocketError {
            message: msg.into(),
        }
    }

    pub fn http(msg: impl Into<String>) -> Self {
        Self::HttpError {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: msg.into(),
        }
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError {
            message: msg.into(),
        }
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<url::ParseError> for StreamError {
    fn from(err: url::ParseError) -> Self {
        Self::config(format!("Invalid URL: {}", err))
    }
}

#[cfg(feature = "native")]
impl From<tokio_tungstenite::tungstenite::Error> for StreamError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::websocket(format!("{:?}", err))
    }
}

#[cfg(feature = "native")]
impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        Self::http(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_message() {
        let err = StreamError::protocol("bad frame");
        assert_eq!(err.to_string(), "Protocol error: bad frame");
    }

    #[test]
    fn test_from_json_error() {
        let err: StreamError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, StreamError::SerializationError { .. }));
    }
}
