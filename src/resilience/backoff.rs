//! Backoff policies for retrying the same endpoint.

use std::fmt::Debug;
use std::time::Duration;
use rand::Rng;

/// Decides whether (and how long) to wait before retrying the current endpoint.
pub trait BackoffPolicy: Send + Sync + Debug {
    /// `failed_attempts` is the number of consecutive failures against the current endpoint.
    /// `None` means give up on this endpoint and fail over.
    fn backoff(&self, failed_attempts: u32) -> Option<Duration>;
}

/// Randomized exponential backoff, bounded by a retry count.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    max_num_retries: u32,
    backoff_slot_size: Duration,
}

impl ExponentialBackoff {
    pub fn new(max_num_retries: u32, backoff_slot_size: Duration) -> Self {
        Self {
            max_num_retries,
            backoff_slot_size,
        }
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn backoff(&self, failed_attempts: u32) -> Option<Duration> {
        if failed_attempts > self.max_num_retries {
            return None;
        }
        Some(calculate_backoff(failed_attempts, self.backoff_slot_size))
    }
}

/// Never retries the same endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl BackoffPolicy for NoBackoff {
    fn backoff(&self, _failed_attempts: u32) -> Option<Duration> {
        None
    }
}

/// Uniformly random duration in `[0, slot * 2^attempt)`.
pub fn calculate_backoff(attempt: u32, slot: Duration) -> Duration {
    let slot_micros = u64::try_from(slot.as_micros()).unwrap_or(u64::MAX);
    let multiplier = 2u64.saturating_pow(attempt);
    let upper = slot_micros.saturating_mul(multiplier);
    if upper == 0 {
        return Duration::ZERO;
    }
    Duration::from_micros(rand::thread_rng().gen_range(0..upper))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let slot = Duration::from_millis(100);
        for _ in 0..100 {
            assert!(calculate_backoff(1, slot) < Duration::from_millis(200));
            assert!(calculate_backoff(3, slot) < Duration::from_millis(800));
        }
        assert_eq!(calculate_backoff(2, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_backoff_does_not_overflow() {
        let d = calculate_backoff(200, Duration::from_secs(1));
        assert!(d < Duration::from_micros(u64::MAX));
    }

    #[test]
    fn test_exponential_backoff_bounded_by_retries() {
        let policy = ExponentialBackoff::new(2, Duration::from_millis(10));
        assert!(policy.backoff(1).is_some());
        assert!(policy.backoff(2).is_some());
        assert_eq!(policy.backoff(3), None);
    }

    #[test]
    fn test_no_backoff() {
        assert_eq!(NoBackoff.backoff(1), None);
    }
}
