//! Callback registry for managing event callbacks.

use super::event::{EventKind, StreamEvent};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Type alias for callback function
pub type CallbackFn = Arc<dyn Fn(&StreamEvent) + Send + Sync + 'static>;

/// A registered callback
#[derive(Clone)]
pub struct Callback {
    pub id: u64,
    pub callback: CallbackFn,
}

impl Callback {
    pub fn new(id: u64, callback: impl Fn(&StreamEvent) + Send + Sync + 'static) -> Self {
        Self {
            id,
            callback: Arc::new(callback),
        }
    }

    pub fn invoke(&self, event: &StreamEvent) {
        (self.callback)(event);
    }
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callback").field("id", &self.id).finish()
    }
}

/// Append-only registry of callbacks per event kind.
///
/// Callbacks are kept in registration order and are never removed.
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    callbacks: DashMap<EventKind, Vec<Callback>>,
    next_id: AtomicU64,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            callbacks: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Add a callback for an event kind
    pub fn add(
        &self,
        kind: EventKind,
        callback: impl Fn(&StreamEvent) + Send + Sync + 'static,
    ) -> u64 {
        let id = self.next_id();
        self.callbacks
            .entry(kind)
            .or_default()
            .push(Callback::new(id, callback));
        id
    }

    /// Snapshot of the callbacks for an event kind, in registration order.
    ///
    /// The map guard is released before returning so callbacks may register
    /// further callbacks while being invoked.
    pub fn get(&self, kind: EventKind) -> Vec<Callback> {
        self.callbacks
            .get(&kind)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    /// Check if there are any callbacks for an event kind
    pub fn has_callbacks(&self, kind: EventKind) -> bool {
        self.callbacks
            .get(&kind)
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    /// Get number of registered callbacks
    pub fn callback_count(&self) -> usize {
        self.callbacks.iter().map(|v| v.len()).sum()
    }
}
