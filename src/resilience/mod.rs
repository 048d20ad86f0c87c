//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to remote service:
//!     → failover.rs (pick endpoint via NodeSelector, send via Transport)
//!     → On failure: qos classification, then backoff.rs (retry same node?)
//!     → No more retries: fail over to the next node, or give up when all failed
//! ```
//!
//! # Design Decisions
//! - Backoff and node selection are separate seams composed by the retryer
//! - Timeouts are the transport's job; the retryer only sees their errors
//! - QoS redirects are followed, not counted as failures

pub mod backoff;
pub mod failover;

pub use backoff::{calculate_backoff, BackoffPolicy, ExponentialBackoff, NoBackoff};
pub use failover::{CallAttemptState, CallFailure, FailoverError, FailoverRetryer};
