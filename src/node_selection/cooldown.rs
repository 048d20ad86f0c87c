//! Failed-endpoint cooldown tracking.

use std::time::{Duration, Instant};
use dashmap::DashMap;

/// Endpoints that recently failed, keyed by index, with the time they become usable again.
#[derive(Debug)]
pub struct FailedEndpoints {
    cooldown: Duration,
    until: DashMap<usize, Instant>,
}

impl FailedEndpoints {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            until: DashMap::new(),
        }
    }

    /// Start (or restart) the cooldown for `index`.
    pub fn mark(&self, index: usize) {
        if self.cooldown.is_zero() {
            return;
        }
        self.until.insert(index, Instant::now() + self.cooldown);
    }

    pub fn clear(&self, index: usize) {
        self.until.remove(&index);
    }

    /// True while `index` is cooling down. Expired entries are dropped.
    pub fn is_cooling(&self, index: usize) -> bool {
        let deadline = match self.until.get(&index) {
            Some(deadline) => *deadline,
            None => return false,
        };
        if Instant::now() < deadline {
            return true;
        }
        self.until.remove_if(&index, |_, d| *d == deadline);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_expires() {
        let failed = FailedEndpoints::new(Duration::from_millis(20));
        failed.mark(1);
        assert!(failed.is_cooling(1));
        assert!(!failed.is_cooling(0));
        std::thread::sleep(Duration::from_millis(30));
        assert!(!failed.is_cooling(1));
    }

    #[test]
    fn test_zero_cooldown_never_cools() {
        let failed = FailedEndpoints::new(Duration::ZERO);
        failed.mark(0);
        assert!(!failed.is_cooling(0));
    }

    #[test]
    fn test_clear() {
        let failed = FailedEndpoints::new(Duration::from_secs(60));
        failed.mark(2);
        failed.clear(2);
        assert!(!failed.is_cooling(2));
    }
}
