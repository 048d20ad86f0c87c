//! Configuration schema definitions.
//!
//! This module defines the raw configuration structure for the gateway and its client.
//! All types derive Serde traits for deserialization from config files; semantic checks
//! live in `validation.rs`.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Service name used to key host metrics.
    pub service_name: String,

    /// Outbound client settings (nodes, retries, node selection).
    pub client: ClientConfig,

    /// Inbound per-feature rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Transport timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            service_name: "upstream".to_string(),
            client: ClientConfig::default(),
            rate_limit: RateLimitConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum buffered request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// How the target node is selected for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeSelectionStrategy {
    /// Move to the next node on every call; failed nodes cool down and are skipped until the cooldown expires.
    RoundRobin,
    /// Sticky node until it errors, then fail over once.
    #[default]
    PinUntilError,
    /// A different starting node on every call.
    UnlimitedRoundRobin,
}

/// What to do with 429/503 responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
pub enum ServerQos {
    /// Retry/fail over internally.
    #[default]
    #[serde(rename = "AUTOMATIC_RETRY")]
    AutomaticRetry,
    /// Hand Throttle/Unavailable straight back to the caller. RedirectOther is still followed.
    #[serde(rename = "PROPAGATE_429_AND_503_TO_CALLER")]
    Propagate429And503ToCaller,
}

/// Outbound client configuration, as read from a file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URLs of the equivalent nodes.
    pub uris: Vec<String>,

    /// Maximum retries against one node before failing over.
    pub max_num_retries: u32,

    /// Node selection strategy.
    pub node_selection_strategy: NodeSelectionStrategy,

    /// How long a failed node is avoided (ROUND_ROBIN only), in milliseconds.
    pub failed_url_cooldown_ms: u64,

    /// Backoff slot size in milliseconds; retry `c` waits up to `slot * 2^c`.
    pub backoff_slot_size_ms: u64,

    /// Optional `host:port` of a mesh proxy that performs retries itself.
    pub mesh_proxy: Option<String>,

    /// Handling of server QoS responses.
    pub server_qos: ServerQos,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            uris: Vec::new(),
            max_num_retries: 4,
            node_selection_strategy: NodeSelectionStrategy::PinUntilError,
            failed_url_cooldown_ms: 0,
            backoff_slot_size_ms: 250,
            mesh_proxy: None,
            server_qos: ServerQos::AutomaticRetry,
        }
    }
}

/// Inbound per-feature rate limiting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests per second allowed per feature (also the burst size).
    pub requests_per_second: u32,

    /// Distinct features tracked before limiting is switched off.
    pub max_features: usize,

    /// Request header naming the feature.
    pub feature_header: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 100,
            max_features: 1_000,
            feature_header: "x-feature".to_string(),
        }
    }
}

/// Timeout configuration for the outbound transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            request_secs: 300,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// How often host metrics are exported as gauges, in seconds.
    pub host_metrics_export_secs: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
            host_metrics_export_secs: 30,
        }
    }
}
