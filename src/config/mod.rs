//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors collected)
//!     → ClientResiliencyConfig (validated, immutable)
//!     → factories: backoff_policy(), node_selector()
//!     → shared via Arc with the failover retryer
//! ```
//!
//! # Design Decisions
//! - Config is immutable once validated; a new config means a new retryer
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError, LoadedConfig};
pub use schema::{
    ClientConfig, GatewayConfig, ListenerConfig, NodeSelectionStrategy, ObservabilityConfig,
    RateLimitConfig, ServerQos, TimeoutConfig,
};
pub use validation::{validate_client_config, validate_config, ClientResiliencyConfig, MeshProxy, ValidationError};
