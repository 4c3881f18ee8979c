//! Connection management.

mod backoff;
mod identity;
mod state;
mod stream;
mod watchdog;

pub use backoff::{BackoffPolicy, ConstantBackoff, ExponentialBackoff};
pub use state::{ConnectionState, StreamStatus};
pub use stream::{ClientStream, DisconnectOptions, ReconnectOptions, StreamBuilder};
