//! Handshake record sent by the server as the first frame of every connection.

use crate::error::{Result, StreamError};
use serde::{Deserialize, Serialize};

/// First inbound frame of an epoch: `{"server_id": "..."}`.
///
/// Every field is optional. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
}

impl Handshake {
    /// Parse a raw handshake frame.
    pub fn parse(data: &str) -> Result<Self> {
        serde_json::from_str(data)
            .map_err(|e| StreamError::protocol(format!("malformed handshake: {}", e)))
    }
}
