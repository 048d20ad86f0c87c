//! Pin-until-error node selection.

use std::sync::atomic::{AtomicUsize, Ordering};
use crate::node_selection::{EndpointSet, NodeSelector};

/// Keeps using one endpoint across calls until a call fails over away from it.
#[derive(Debug, Default)]
pub struct PinUntilError {
    current: AtomicUsize,
}

impl PinUntilError {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeSelector for PinUntilError {
    fn start_index(&self, endpoints: &EndpointSet) -> usize {
        self.current.load(Ordering::Relaxed) % endpoints.len()
    }

    fn pin(&self, index: usize) {
        self.current.store(index, Ordering::Relaxed);
    }
}
