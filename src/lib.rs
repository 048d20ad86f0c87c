//! Client-side resiliency core: failover, QoS handling, host health and per-feature rate limiting.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod node_selection;
pub mod observability;
pub mod qos;
pub mod resilience;
pub mod security;

pub use config::{ClientResiliencyConfig, GatewayConfig};
pub use health::HostHealthRegistry;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use qos::{classify, QosSignal};
pub use resilience::{FailoverError, FailoverRetryer};
pub use security::FeatureRateLimiter;
