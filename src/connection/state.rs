//! Connection state management.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// A connection attempt is in flight
    Connecting,
    /// The handshake arrived and messages flow
    Connected,
    /// The link was lost; a retry is scheduled
    Waiting,
    /// Permanently disconnected by the caller
    Failed,
    /// Disconnected by the caller; automatic retries are suppressed
    Offline,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Waiting => "waiting",
            Self::Failed => "failed",
            Self::Offline => "offline",
        }
    }

    /// Check if connecting or connected
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if the caller switched the stream off
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Offline | Self::Failed)
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Connecting
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a stream's connection status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatus {
    pub status: ConnectionState,
    pub connected: bool,
    /// Failed attempts since the last successful handshake
    pub retry_count: u32,
    /// When the next attempt is scheduled, while waiting
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub retry_time: Option<DateTime<Utc>>,
    /// Why the stream failed, when failed permanently
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StreamStatus {
    pub(crate) fn connecting(retry_count: u32) -> Self {
        Self {
            status: ConnectionState::Connecting,
            connected: false,
            retry_count,
            retry_time: None,
            reason: None,
        }
    }
}
