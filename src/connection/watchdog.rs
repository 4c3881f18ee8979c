//! Heartbeat watchdog.

use std::time::Duration;

use crate::utils::CancellableTimer;

/// Single timer holding the time left before the link is declared dead.
///
/// Every re-arm replaces the previous timer, which cancels it, so at most one
/// expiry is ever pending.
#[derive(Debug)]
pub(crate) struct HeartbeatWatchdog {
    timeout: Duration,
    timer: Option<CancellableTimer>,
}

impl HeartbeatWatchdog {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            timer: None,
        }
    }

    /// Restart the countdown from the full timeout
    pub(crate) fn rearm<F>(&mut self, on_expiry: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.timer = Some(CancellableTimer::new(self.timeout, on_expiry));
    }

    pub(crate) fn clear(&mut self) {
        self.timer = None;
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| t.is_active())
    }
}
