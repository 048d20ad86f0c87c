//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (extract feature key, withdraw one token)
//!     → Rejected: 429 Too Many Requests, request never reaches the retryer
//!     → Allowed: pass to the gateway handler
//! ```
//!
//! # Design Decisions
//! - Admission is checked before any outbound work is done
//! - Fail open: unknown or too many features never cause rejections

pub mod rate_limit;

pub use rate_limit::{feature_rate_limit_middleware, header_feature, Admission, FeatureExtractor, FeatureRateLimiter};
