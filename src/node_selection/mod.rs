//! Node selection subsystem.
//!
//! # Data Flow
//! ```text
//! Call starts
//!     → start_index() (sticky for PIN_UNTIL_ERROR, rotating for both round-robin strategies)
//!     → transport attempt against endpoints.get(index)
//!     → succeeded(index) | failed(index)
//!     → next_index(index, given_up) (ROUND_ROBIN prefers endpoints not cooling down)
//!     → pin(next index)
//! ```
//!
//! # Design Decisions
//! - The selector only owns cross-call state (start index, cooldowns)
//! - Per-call counters live in the retryer's CallAttemptState
//! - Every cooling endpoint is still selectable as a last resort (fail open)

pub mod cooldown;
pub mod endpoint;
pub mod pin_until_error;
pub mod round_robin;
pub mod unlimited;

use std::fmt::Debug;
use std::time::Duration;

use crate::config::schema::NodeSelectionStrategy;

pub use cooldown::FailedEndpoints;
pub use endpoint::{Endpoint, EndpointError, EndpointSet};
pub use pin_until_error::PinUntilError;
pub use round_robin::RoundRobin;
pub use unlimited::UnlimitedRoundRobin;

/// Strategy for choosing which endpoint a call talks to.
pub trait NodeSelector: Send + Sync + Debug {
    /// Index a new call starts from.
    fn start_index(&self, endpoints: &EndpointSet) -> usize;

    /// Endpoint to fail over to after `from`, skipping endpoints this call already gave up on.
    ///
    /// `given_up` has one flag per endpoint. Returns `None` once every endpoint is given up.
    fn next_index(&self, endpoints: &EndpointSet, from: usize, given_up: &[bool]) -> Option<usize> {
        let len = endpoints.len();
        (1..=len)
            .map(|step| (from + step) % len)
            .find(|&candidate| !given_up.get(candidate).copied().unwrap_or(false))
    }

    /// The endpoint at `index` answered successfully.
    fn succeeded(&self, index: usize) {
        self.pin(index);
    }

    /// The call gave up on the endpoint at `index`.
    fn failed(&self, _index: usize) {}

    /// Make `index` the starting point for later calls.
    fn pin(&self, index: usize);
}

/// Build the selector for `strategy`.
pub fn selector_for(strategy: NodeSelectionStrategy, failed_url_cooldown: Duration) -> Box<dyn NodeSelector> {
    match strategy {
        NodeSelectionStrategy::PinUntilError => Box::new(PinUntilError::new()),
        NodeSelectionStrategy::RoundRobin => Box::new(RoundRobin::new(failed_url_cooldown)),
        NodeSelectionStrategy::UnlimitedRoundRobin => Box::new(UnlimitedRoundRobin::new()),
    }
}
