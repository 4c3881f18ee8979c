//! Events emitted by a client stream.

use crate::error::StreamError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The kinds of event a caller can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An application payload arrived while connected
    Message,
    /// A new connection epoch is live; resynchronize protocol state
    Reset,
    /// The server reported a build identity different from the known one
    UpdateAvailable,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Reset => "reset",
            Self::UpdateAvailable => "update_available",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(Self::Message),
            "reset" => Ok(Self::Reset),
            "update_available" => Ok(Self::UpdateAvailable),
            other => Err(StreamError::invalid_event(format!(
                "unknown stream event '{}'",
                other
            ))),
        }
    }
}

/// An emitted event with its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Message(String),
    Reset,
    UpdateAvailable { server_id: String },
}

impl StreamEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message(_) => EventKind::Message,
            Self::Reset => EventKind::Reset,
            Self::UpdateAvailable { .. } => EventKind::UpdateAvailable,
        }
    }

    /// Payload of a `message` event
    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::Message(data) => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in [EventKind::Message, EventKind::Reset, EventKind::UpdateAvailable] {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("connected".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_event_kind_and_payload() {
        let event = StreamEvent::Message("hi".to_string());
        assert_eq!(event.kind(), EventKind::Message);
        assert_eq!(event.payload(), Some("hi"));
        assert_eq!(StreamEvent::Reset.payload(), None);
        assert_eq!(
            StreamEvent::UpdateAvailable {
                server_id: "x".to_string()
            }
            .kind(),
            EventKind::UpdateAvailable
        );
    }
}
