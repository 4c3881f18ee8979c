//! Timer utilities.

use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::sleep;

/// A single-shot timer that can be cancelled.
///
/// The callback runs on a spawned task once `duration` has elapsed, unless
/// the timer was cancelled or dropped first.
pub struct CancellableTimer {
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl CancellableTimer {
    /// Create a new timer that executes a callback after the specified duration
    pub fn new<F>(duration: Duration, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = oneshot::channel();

        tokio::spawn(async move {
            tokio::select! {
                _ = sleep(duration) => {
                    callback();
                }
                _ = cancel_rx => {}
            }
        });

        Self {
            cancel_tx: Some(cancel_tx),
        }
    }

    /// Cancel the timer
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Check if the timer has not been cancelled
    pub fn is_active(&self) -> bool {
        self.cancel_tx.is_some()
    }
}

impl Drop for CancellableTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for CancellableTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellableTimer")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_duration() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let _timer = CancellableTimer::new(Duration::from_secs(5), move || {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!fired.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_callback() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let mut timer = CancellableTimer::new(Duration::from_secs(1), move || {
            flag.store(true, Ordering::SeqCst);
        });

        timer.cancel();
        assert!(!timer.is_active());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        drop(CancellableTimer::new(Duration::from_secs(1), move || {
            flag.store(true, Ordering::SeqCst);
        }));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
