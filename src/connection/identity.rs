//! Server identity tracking for `update_available` notifications.

use std::collections::HashSet;

/// Remembers which server identity the client knows and which new identities
/// were already announced.
#[derive(Debug, Default)]
pub(crate) struct ServerIdentity {
    known: Option<String>,
    notified: HashSet<String>,
}

impl ServerIdentity {
    pub(crate) fn new(known: Option<String>) -> Self {
        Self {
            known,
            notified: HashSet::new(),
        }
    }

    /// Record a handshake identity. Returns `true` when an update should be
    /// announced: the identity differs from the known one and was never
    /// announced before. Without a configured identity, the first one seen
    /// becomes the known identity.
    pub(crate) fn observe(&mut self, server_id: &str) -> bool {
        match &self.known {
            None => {
                self.known = Some(server_id.to_string());
                false
            }
            Some(known) if known == server_id => false,
            Some(_) => self.notified.insert(server_id.to_string()),
        }
    }
}
