//! SockJS framing.
//!
//! Every SockJS transport carries the same envelope:
//!
//! - `o`: session opened
//! - `h`: heartbeat
//! - `a["m1","m2"]`: one or more messages
//! - `c[3000,"Go away!"]`: session closed by the server
//!
//! Outbound messages are sent as a JSON array of strings.

use crate::error::{Result, StreamError};
use rand::distributions::Alphanumeric;
use rand::Rng;

const SESSION_ID_LEN: usize = 8;

/// A decoded SockJS frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SockJsFrame {
    Open,
    Heartbeat,
    Messages(Vec<String>),
    Close { code: u16, reason: String },
}

impl SockJsFrame {
    /// Decode a single frame.
    pub fn decode(raw: &str) -> Result<Self> {
        let mut chars = raw.chars();
        let kind = chars
            .next()
            .ok_or_else(|| StreamError::protocol("empty SockJS frame"))?;
        let body = chars.as_str();

        match kind {
            'o' => Ok(Self::Open),
            'h' => Ok(Self::Heartbeat),
            'a' => {
                let messages: Vec<String> = serde_json::from_str(body).map_err(|e| {
                    StreamError::protocol(format!("invalid SockJS message frame: {}", e))
                })?;
                Ok(Self::Messages(messages))
            }
            'c' => {
                let (code, reason): (u16, String) = serde_json::from_str(body).map_err(|e| {
                    StreamError::protocol(format!("invalid SockJS close frame: {}", e))
                })?;
                Ok(Self::Close { code, reason })
            }
            other => Err(StreamError::protocol(format!(
                "unknown SockJS frame type '{}'",
                other
            ))),
        }
    }

    /// Encode outbound messages.
    pub fn encode_messages(messages: &[&str]) -> Result<String> {
        Ok(serde_json::to_string(messages)?)
    }
}

/// Build a fresh session URL below a SockJS base URL:
/// `<base>/<server>/<session>`.
pub fn session_url(base: &str) -> String {
    let mut rng = rand::thread_rng();
    let server: u16 = rng.gen_range(0..1000);
    let session: String = (&mut rng)
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect();

    format!("{}/{:03}/{}", base.trim_end_matches('/'), server, session)
}
