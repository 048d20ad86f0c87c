//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Logging/metrics → Retryer → Listener
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → broadcast → server stops accepting, exporter stops → Exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - One broadcast channel fans shutdown out to every task

pub mod shutdown;

pub use shutdown::{wait_for, Shutdown};
