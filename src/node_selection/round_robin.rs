//! Round-robin node selection with failed-endpoint cooldown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use crate::node_selection::{EndpointSet, FailedEndpoints, NodeSelector};

/// Moves every call on to the next endpoint, passing over endpoints that failed within the cooldown window.
#[derive(Debug)]
pub struct RoundRobin {
    /// Where the next call starts looking.
    next: AtomicUsize,
    cooling: FailedEndpoints,
}

impl RoundRobin {
    pub fn new(failed_url_cooldown: Duration) -> Self {
        Self {
            next: AtomicUsize::new(0),
            cooling: FailedEndpoints::new(failed_url_cooldown),
        }
    }

    /// First endpoint at or after `from` that is not cooling down, or `from` itself when all are.
    fn first_available(&self, len: usize, from: usize) -> usize {
        (0..len)
            .map(|step| (from + step) % len)
            .find(|&candidate| !self.cooling.is_cooling(candidate))
            .unwrap_or_else(|| {
                tracing::debug!(index = from % len, "All endpoints cooling down, ignoring cooldown");
                from % len
            })
    }
}

impl NodeSelector for RoundRobin {
    fn start_index(&self, endpoints: &EndpointSet) -> usize {
        let len = endpoints.len();
        let mut observed = self.next.load(Ordering::Relaxed);
        loop {
            let chosen = self.first_available(len, observed);
            match self
                .next
                .compare_exchange_weak(observed, (chosen + 1) % len, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return chosen,
                Err(actual) => observed = actual,
            }
        }
    }

    fn next_index(&self, endpoints: &EndpointSet, from: usize, given_up: &[bool]) -> Option<usize> {
        let len = endpoints.len();
        let mut remaining = (1..=len)
            .map(|step| (from + step) % len)
            .filter(|&candidate| !given_up.get(candidate).copied().unwrap_or(false))
            .peekable();
        let fallback = *remaining.peek()?;
        Some(
            remaining
                .find(|&candidate| !self.cooling.is_cooling(candidate))
                .unwrap_or(fallback),
        )
    }

    fn succeeded(&self, index: usize) {
        self.cooling.clear(index);
        self.pin(index);
    }

    fn failed(&self, index: usize) {
        self.cooling.mark(index);
    }

    fn pin(&self, index: usize) {
        self.next.store(index + 1, Ordering::Relaxed);
    }
}
