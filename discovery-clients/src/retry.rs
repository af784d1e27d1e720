//! Backoff schedule for transient upstream failures.

use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};

pub const DEFAULT_MAX_RETRIES: usize = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Jittered delays doubling from `base_delay`.
    pub fn strategy(&self) -> impl Iterator<Item = Duration> {
        self.delays().map(jitter)
    }

    /// The un-jittered schedule: `base, 2*base, 4*base, ...` capped at `max_delay`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        // `ExponentialBackoff` yields `current * factor` with `current` starting
        // at `from_millis(n)` and multiplied by `n` each step, so a base of 2
        // with a factor of `base_delay / 2` doubles from `base_delay`.
        let factor = (self.base_delay.as_millis() as u64 / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
            .take(self.max_retries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let delays: Vec<_> = RetryPolicy::default().delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
                Duration::from_millis(1600),
            ]
        );
    }

    #[test]
    fn test_schedule_is_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            max_delay: Duration::from_secs(1),
            ..RetryPolicy::default()
        };
        assert!(policy.delays().all(|d| d <= Duration::from_secs(1)));
        assert_eq!(RetryPolicy::none().delays().count(), 0);
    }
}
