//! Unlimited round-robin node selection.

use std::sync::atomic::{AtomicUsize, Ordering};
use crate::node_selection::{EndpointSet, NodeSelector};

/// Starts every call at the next endpoint, regardless of earlier outcomes.
#[derive(Debug, Default)]
pub struct UnlimitedRoundRobin {
    counter: AtomicUsize,
}

impl UnlimitedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeSelector for UnlimitedRoundRobin {
    fn start_index(&self, endpoints: &EndpointSet) -> usize {
        self.counter.fetch_add(1, Ordering::Relaxed) % endpoints.len()
    }

    fn pin(&self, _index: usize) {}
}
