//! Reconnect backoff policies.

use rand::Rng;
use std::time::Duration;

/// Decides how long to wait before the next reconnect attempt.
///
/// `retry_count` is the number of failed attempts before the failure being
/// handled, so the first failure after a healthy connection passes `0`.
pub trait BackoffPolicy: Send + Sync {
    fn delay(&self, retry_count: u32) -> Duration;
}

/// Exponential backoff with a floor for the first attempts and jitter.
///
/// The first `min_count` retries wait `min`. After that the delay is
/// `base * exponent^retry_count`, capped at `max`, then scaled by a random
/// factor in `[1 - fuzz/2, 1 + fuzz/2)`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub exponent: f64,
    pub max: Duration,
    pub min: Duration,
    pub min_count: u32,
    pub fuzz: f64,
}

impl ExponentialBackoff {
    /// Delay before jitter is applied
    pub fn nominal_delay(&self, retry_count: u32) -> Duration {
        if retry_count < self.min_count {
            return self.min;
        }

        let scaled = self.base.as_secs_f64() * self.exponent.powi(retry_count as i32);
        Duration::from_secs_f64(scaled.min(self.max.as_secs_f64()))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            exponent: 2.2,
            max: Duration::from_secs(5 * 60),
            min: Duration::from_millis(10),
            min_count: 2,
            fuzz: 0.5,
        }
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, retry_count: u32) -> Duration {
        let nominal = self.nominal_delay(retry_count);
        if retry_count < self.min_count || self.fuzz == 0.0 {
            return nominal;
        }

        let factor = 1.0 - self.fuzz / 2.0 + rand::thread_rng().gen::<f64>() * self.fuzz;
        nominal.mul_f64(factor)
    }
}

/// Always waits the same amount of time
#[derive(Debug, Clone, Copy)]
pub struct ConstantBackoff(pub Duration);

impl BackoffPolicy for ConstantBackoff {
    fn delay(&self, _retry_count: u32) -> Duration {
        self.0
    }
}
