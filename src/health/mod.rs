//! Host health subsystem.
//!
//! # Data Flow
//! ```text
//! Every attempt made by resilience::failover:
//!     → response received: registry.rs record(service, host, port, status, latency)
//!     → no response (I/O failure): registry.rs record_io_exception(service, host, port)
//!     → metric.rs buckets the outcome (1xx..5xx, qos, other)
//!
//! Consumers:
//!     → HostHealthRegistry::query / metrics (read-only snapshots)
//!     → observability::metrics export loop
//!     → gateway host-metrics endpoint
//! ```
//!
//! # Design Decisions
//! - 429 and 503 are QoS outcomes, not generic 4xx/5xx
//! - Bounded by size and idle time; lossy by intent
//! - Health is per (service, host, port), not per endpoint list

pub mod metric;
pub mod registry;

pub use metric::{HostMetric, HostMetricSnapshot, ResponseFamily, TimerSnapshot};
pub use registry::{HostEventsSink, HostHealthRegistry, HostKey, RegistryError};
