//! Quality-of-service signal handling.
//!
//! # Data Flow
//! ```text
//! Transport response (status + headers)
//!     → classifier.rs (308 / 429 / 503 → QosSignal, anything else → None)
//!     → signal.rs (QosSignal + best-effort QosReason)
//!     → resilience::failover decides: redirect, back off, fail over, or propagate
//! ```
//!
//! # Design Decisions
//! - Classification is a pure function; it never fails
//! - Malformed headers degrade to "signal not present" or "hint not present"
//! - Reason parsing can never suppress the primary signal

pub mod classifier;
pub mod signal;

pub use classifier::{classify, parse_reason, HeaderLookup};
pub use signal::{DueTo, QosReason, QosSignal, RetryHint};
