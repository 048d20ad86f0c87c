//! Configuration validation.
//!
//! # Responsibilities
//! - Turn a raw [`ClientConfig`] into an immutable, checked [`ClientResiliencyConfig`]
//! - Validate URIs (absolute, http(s), canonical) and the mesh proxy address
//! - Enforce cross-field invariants (mesh proxy ⇒ no retries and one URI; ROUND_ROBIN ⇒ cooldown)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation happens at configuration-build time, never at call time
//! - The checked config converts back to the raw shape, so the same checks run on reload

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::schema::{ClientConfig, GatewayConfig, NodeSelectionStrategy, ServerQos};
use crate::node_selection::{self, NodeSelector};
use crate::resilience::backoff::{BackoffPolicy, ExponentialBackoff, NoBackoff};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("uris must contain at least one URI")]
    NoUris,
    #[error("not a valid URL: {uri}")]
    InvalidUri { uri: String },
    #[error("base URLs must be 'canonical' and consist of schema, host, port, and path only: {uri}")]
    NonCanonicalUri { uri: String },
    #[error("meshProxy must be of the form host:port, got {value}")]
    InvalidMeshProxy { value: String },
    #[error("if meshProxy is configured then maxNumRetries must be 0")]
    MeshProxyWithRetries,
    #[error("if meshProxy is configured then uris must contain exactly 1 URI")]
    MeshProxyUriCount,
    #[error("if nodeSelectionStrategy is ROUND_ROBIN then failedUrlCooldown must be positive")]
    RoundRobinWithoutCooldown,
    #[error("rate_limit.requests_per_second must be positive")]
    ZeroRequestsPerSecond,
    #[error("rate_limit.max_features must be positive")]
    ZeroMaxFeatures,
    #[error("rate_limit.feature_header is not a valid header name: {value}")]
    InvalidFeatureHeader { value: String },
}

/// A `host:port` mesh proxy address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeshProxy {
    host: String,
    port: u16,
}

impl MeshProxy {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for MeshProxy {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidMeshProxy { value: value.to_string() };
        let (host, port) = value.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() || host.contains('/') {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(Self { host: host.to_string(), port })
    }
}

impl fmt::Display for MeshProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Validated, immutable client resiliency configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientResiliencyConfig {
    uris: Vec<Url>,
    max_num_retries: u32,
    node_selection_strategy: NodeSelectionStrategy,
    failed_url_cooldown: Duration,
    backoff_slot_size: Duration,
    mesh_proxy: Option<MeshProxy>,
    server_qos: ServerQos,
}

impl ClientResiliencyConfig {
    pub fn uris(&self) -> &[Url] {
        &self.uris
    }

    pub fn max_num_retries(&self) -> u32 {
        self.max_num_retries
    }

    pub fn node_selection_strategy(&self) -> NodeSelectionStrategy {
        self.node_selection_strategy
    }

    pub fn failed_url_cooldown(&self) -> Duration {
        self.failed_url_cooldown
    }

    pub fn backoff_slot_size(&self) -> Duration {
        self.backoff_slot_size
    }

    pub fn mesh_proxy(&self) -> Option<&MeshProxy> {
        self.mesh_proxy.as_ref()
    }

    pub fn server_qos(&self) -> ServerQos {
        self.server_qos
    }

    /// Backoff policy for retries against the same node.
    pub fn backoff_policy(&self) -> Box<dyn BackoffPolicy> {
        if self.max_num_retries == 0 {
            Box::new(NoBackoff)
        } else {
            Box::new(ExponentialBackoff::new(self.max_num_retries, self.backoff_slot_size))
        }
    }

    /// Node selector implementing the configured strategy.
    pub fn node_selector(&self) -> Box<dyn NodeSelector> {
        node_selection::selector_for(self.node_selection_strategy, self.failed_url_cooldown)
    }
}

impl TryFrom<&ClientConfig> for ClientResiliencyConfig {
    type Error = Vec<ValidationError>;

    fn try_from(config: &ClientConfig) -> Result<Self, Self::Error> {
        validate_client_config(config)
    }
}

impl From<&ClientResiliencyConfig> for ClientConfig {
    fn from(config: &ClientResiliencyConfig) -> Self {
        ClientConfig {
            uris: config.uris.iter().map(Url::to_string).collect(),
            max_num_retries: config.max_num_retries,
            node_selection_strategy: config.node_selection_strategy,
            failed_url_cooldown_ms: duration_millis(config.failed_url_cooldown),
            backoff_slot_size_ms: duration_millis(config.backoff_slot_size),
            mesh_proxy: config.mesh_proxy.as_ref().map(MeshProxy::to_string),
            server_qos: config.server_qos,
        }
    }
}

/// Validate a client configuration, collecting every error.
pub fn validate_client_config(config: &ClientConfig) -> Result<ClientResiliencyConfig, Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.uris.is_empty() {
        errors.push(ValidationError::NoUris);
    }

    let mut uris = Vec::with_capacity(config.uris.len());
    for uri in &config.uris {
        match parse_base_url(uri) {
            Ok(url) => uris.push(url),
            Err(e) => errors.push(e),
        }
    }

    let mesh_proxy = match config.mesh_proxy.as_deref().map(MeshProxy::from_str) {
        Some(Ok(proxy)) => Some(proxy),
        Some(Err(e)) => {
            errors.push(e);
            None
        }
        None => None,
    };

    if config.mesh_proxy.is_some() {
        if config.max_num_retries != 0 {
            errors.push(ValidationError::MeshProxyWithRetries);
        }
        if config.uris.len() != 1 {
            errors.push(ValidationError::MeshProxyUriCount);
        }
    }

    if config.node_selection_strategy == NodeSelectionStrategy::RoundRobin && config.failed_url_cooldown_ms == 0 {
        errors.push(ValidationError::RoundRobinWithoutCooldown);
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ClientResiliencyConfig {
        uris,
        max_num_retries: config.max_num_retries,
        node_selection_strategy: config.node_selection_strategy,
        failed_url_cooldown: Duration::from_millis(config.failed_url_cooldown_ms),
        backoff_slot_size: Duration::from_millis(config.backoff_slot_size_ms),
        mesh_proxy,
        server_qos: config.server_qos,
    })
}

/// Validate the whole gateway configuration, returning the checked client config.
pub fn validate_config(config: &GatewayConfig) -> Result<ClientResiliencyConfig, Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.rate_limit.enabled {
        if config.rate_limit.requests_per_second == 0 {
            errors.push(ValidationError::ZeroRequestsPerSecond);
        }
        if config.rate_limit.max_features == 0 {
            errors.push(ValidationError::ZeroMaxFeatures);
        }
        if axum::http::HeaderName::from_str(&config.rate_limit.feature_header).is_err() {
            errors.push(ValidationError::InvalidFeatureHeader {
                value: config.rate_limit.feature_header.clone(),
            });
        }
    }

    match validate_client_config(&config.client) {
        Ok(client) if errors.is_empty() => Ok(client),
        Ok(_) => Err(errors),
        Err(client_errors) => {
            errors.extend(client_errors);
            Err(errors)
        }
    }
}

/// Parse a base URL, mapping ws/wss to http/https and rejecting non-canonical forms.
fn parse_base_url(uri: &str) -> Result<Url, ValidationError> {
    let invalid = || ValidationError::InvalidUri { uri: uri.to_string() };
    let url = Url::parse(&switch_ws_to_http(uri)).map_err(|_| invalid())?;

    if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
        return Err(invalid());
    }
    let canonical = url.username().is_empty()
        && url.password().is_none()
        && url.query().is_none()
        && url.fragment().is_none();
    if !canonical {
        return Err(ValidationError::NonCanonicalUri { uri: uri.to_string() });
    }
    Ok(url)
}

fn switch_ws_to_http(uri: &str) -> String {
    let lower = uri.get(..4).map(str::to_ascii_lowercase).unwrap_or_default();
    if lower == "wss:" {
        format!("https:{}", &uri[4..])
    } else if lower.starts_with("ws:") {
        format!("http:{}", &uri[3..])
    } else {
        uri.to_string()
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
