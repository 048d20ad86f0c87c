//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ClientResiliencyConfig, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// A parsed file together with its checked client configuration.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub raw: GatewayConfig,
    pub client: ClientResiliencyConfig,
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<LoadedConfig, ConfigError> {
    let raw: GatewayConfig = toml::from_str(content)?;
    let client = validate_config(&raw).map_err(ConfigError::Validation)?;
    Ok(LoadedConfig { raw, client })
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{NodeSelectionStrategy, ServerQos};
    use std::time::Duration;

    #[test]
    fn test_minimal_config() {
        let loaded = parse_config(r#"
            [client]
            uris = ["https://a.example:8443"]
        "#).unwrap();
        assert_eq!(loaded.raw.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(loaded.client.max_num_retries(), 4);
        assert_eq!(loaded.client.uris().len(), 1);
    }

    #[test]
    fn test_full_client_section() {
        let loaded = parse_config(r#"
            service_name = "billing"

            [client]
            uris = ["https://a.example", "https://b.example"]
            max_num_retries = 2
            node_selection_strategy = "ROUND_ROBIN"
            failed_url_cooldown_ms = 500
            backoff_slot_size_ms = 10
            server_qos = "PROPAGATE_429_AND_503_TO_CALLER"

            [rate_limit]
            enabled = true
            requests_per_second = 5
        "#).unwrap();
        assert_eq!(loaded.raw.service_name, "billing");
        assert_eq!(loaded.client.node_selection_strategy(), NodeSelectionStrategy::RoundRobin);
        assert_eq!(loaded.client.failed_url_cooldown(), Duration::from_millis(500));
        assert_eq!(loaded.client.server_qos(), ServerQos::Propagate429And503ToCaller);
        assert_eq!(loaded.raw.rate_limit.requests_per_second, 5);
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[client\nuris = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_lists_every_problem() {
        let err = parse_config(r#"
            [client]
            uris = []
            node_selection_strategy = "ROUND_ROBIN"
        "#).unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(
                errors,
                vec![ValidationError::NoUris, ValidationError::RoundRobinWithoutCooldown]
            ),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/resilient.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
