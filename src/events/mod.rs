//! Event dispatcher and callback management.

mod callback;
mod dispatcher;
mod event;

pub use callback::{Callback, CallbackFn, CallbackRegistry};
pub use dispatcher::EventDispatcher;
pub use event::{EventKind, StreamEvent};
