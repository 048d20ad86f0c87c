//! The outbound transport boundary.
//!
//! # Responsibilities
//! - Describe one request independently of the endpoint it is sent to
//! - Classify transport failures into retryable and non-retryable kinds
//!
//! # Design Decisions
//! - Requests are fully buffered so every attempt can resend the same bytes
//! - The retryer is generic over `Transport`; tests plug in scripted transports

use std::future::Future;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use thiserror::Error;
use url::Url;

/// A request that can be replayed against any endpoint.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    /// Path and query appended to the endpoint's base URL.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OutboundRequest {
    pub fn new(method: Method, path_and_query: impl Into<String>) -> Self {
        Self {
            method,
            path_and_query: path_and_query.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(path_and_query: impl Into<String>) -> Self {
        Self::new(Method::GET, path_and_query)
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure to obtain a response from an endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("DNS resolution failed: {0}")]
    Dns(String),
    #[error("response aborted or malformed: {0}")]
    Aborted(String),
    #[error("request could not be sent: {0}")]
    Other(String),
}

impl TransportError {
    /// Node-level failures are worth trying again elsewhere.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Other(_))
    }
}

/// Sends a request to one concrete URL.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        target: &Url,
        request: &OutboundRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(TransportError::Connect("refused".into()).is_retryable());
        assert!(TransportError::Timeout("read".into()).is_retryable());
        assert!(TransportError::Dns("nxdomain".into()).is_retryable());
        assert!(TransportError::Aborted("eof".into()).is_retryable());
        assert!(!TransportError::Other("bad header".into()).is_retryable());
    }

    #[test]
    fn test_success_range() {
        assert!(TransportResponse::new(204).is_success());
        assert!(!TransportResponse::new(308).is_success());
    }
}
