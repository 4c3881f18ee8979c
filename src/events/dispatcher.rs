//! Event dispatcher for managing and emitting stream events.

use super::callback::CallbackRegistry;
use super::event::{EventKind, StreamEvent};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Event dispatcher that manages callback bindings and event emission.
///
/// Every callback runs inside its own `catch_unwind`, so one panicking
/// listener never prevents the others from seeing the event.
#[derive(Clone)]
pub struct EventDispatcher {
    callbacks: Arc<CallbackRegistry>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    /// Create a new event dispatcher
    pub fn new() -> Self {
        Self {
            callbacks: Arc::new(CallbackRegistry::new()),
        }
    }

    /// Bind a callback to an event kind
    pub fn bind(
        &self,
        kind: EventKind,
        callback: impl Fn(&StreamEvent) + Send + Sync + 'static,
    ) -> u64 {
        debug!("Binding callback for event: {}", kind);
        self.callbacks.add(kind, callback)
    }

    /// Emit an event to all callbacks bound to its kind, in binding order
    pub fn emit(&self, event: &StreamEvent) {
        let kind = event.kind();
        if !self.callbacks.has_callbacks(kind) {
            trace!("No callbacks for '{}'", kind);
            return;
        }

        for callback in self.callbacks.get(kind) {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback.invoke(event);
            })) {
                warn!("Callback {} for '{}' panicked: {:?}", callback.id, kind, e);
            }
        }
    }

    /// Get total number of registered callbacks
    pub fn callback_count(&self) -> usize {
        self.callbacks.callback_count()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("callback_count", &self.callback_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_bind_and_emit() {
        let dispatcher = EventDispatcher::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        dispatcher.bind(EventKind::Reset, move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.emit(&StreamEvent::Reset);
        dispatcher.emit(&StreamEvent::Message("ignored".to_string()));

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_in_binding_order() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            dispatcher.bind(EventKind::Message, move |event| {
                seen.lock()
                    .push(format!("{}:{}", tag, event.payload().unwrap_or_default()));
            });
        }

        dispatcher.emit(&StreamEvent::Message("m".to_string()));

        assert_eq!(*seen.lock(), vec!["first:m", "second:m", "third:m"]);
    }

    #[test]
    fn test_panicking_callback_is_isolated() {
        let dispatcher = EventDispatcher::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let before = counter.clone();
        dispatcher.bind(EventKind::Reset, move |_| {
            before.fetch_add(1, Ordering::SeqCst);
        });
        dispatcher.bind(EventKind::Reset, |_| panic!("listener failure"));
        let after = counter.clone();
        dispatcher.bind(EventKind::Reset, move |_| {
            after.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.emit(&StreamEvent::Reset);
        dispatcher.emit(&StreamEvent::Reset);

        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_bind_from_inside_callback() {
        let dispatcher = EventDispatcher::new();
        let inner = dispatcher.clone();

        dispatcher.bind(EventKind::Reset, move |_| {
            inner.bind(EventKind::Reset, |_| {});
        });

        dispatcher.emit(&StreamEvent::Reset);
        assert_eq!(dispatcher.callback_count(), 2);
    }
}
