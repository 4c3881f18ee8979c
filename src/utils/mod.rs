//! Utility functions and types.

pub mod timers;

pub use timers::CancellableTimer;
