//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (attempt/failover/rate-limit counters)
//!
//! HostHealthRegistry snapshots
//!     → metrics.rs exporter task (periodic gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (service, endpoint, attempt) on every retry decision
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
