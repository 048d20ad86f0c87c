//! Candidate endpoints for one remote service.
//!
//! # Responsibilities
//! - Hold the immutable, non-empty list of base URLs
//! - Randomize the order once, so clients sharing a list spread their load
//! - Resolve request paths against a base URL
//! - Map an arbitrary URL back to the base URL it belongs to

use std::fmt;
use rand::seq::SliceRandom;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("endpoint set must not be empty")]
    NoEndpoints,
    #[error("base URL has no host: {0}")]
    MissingHost(String),
}

/// A single node's base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(url: Url) -> Result<Self, EndpointError> {
        let host = url
            .host_str()
            .ok_or_else(|| EndpointError::MissingHost(url.to_string()))?
            .to_ascii_lowercase();
        let port = url.port_or_known_default().unwrap_or(80);
        Ok(Self { url, host, port })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Append `path_and_query` (e.g. `/v1/items?x=1`) to this base URL.
    pub fn resolve(&self, path_and_query: &str) -> Result<Url, url::ParseError> {
        let base = self.url.as_str().trim_end_matches('/');
        if path_and_query.is_empty() || path_and_query == "/" {
            return Url::parse(&format!("{}/", base));
        }
        if path_and_query.starts_with('/') {
            Url::parse(&format!("{}{}", base, path_and_query))
        } else {
            Url::parse(&format!("{}/{}", base, path_and_query))
        }
    }

    /// True if `url` lives under this base URL.
    fn contains(&self, url: &Url) -> bool {
        let same_host = url
            .host_str()
            .map(|h| h.eq_ignore_ascii_case(&self.host))
            .unwrap_or(false);
        let base_path = self.url.path().trim_end_matches('/');
        url.scheme() == self.url.scheme()
            && same_host
            && url.port_or_known_default() == Some(self.port)
            && url.path().starts_with(base_path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Ordered, immutable list of endpoints.
#[derive(Debug, Clone)]
pub struct EndpointSet {
    endpoints: Vec<Endpoint>,
}

impl EndpointSet {
    /// Build a set in a random order.
    pub fn shuffled(urls: Vec<Url>) -> Result<Self, EndpointError> {
        let mut set = Self::ordered(urls)?;
        set.endpoints.shuffle(&mut rand::thread_rng());
        Ok(set)
    }

    /// Build a set keeping the given order.
    pub fn ordered(urls: Vec<Url>) -> Result<Self, EndpointError> {
        if urls.is_empty() {
            return Err(EndpointError::NoEndpoints);
        }
        let endpoints = urls.into_iter().map(Endpoint::new).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { endpoints })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// True when the set holds no endpoints.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Endpoint at `index`, wrapping around.
    pub fn get(&self, index: usize) -> &Endpoint {
        &self.endpoints[index % self.endpoints.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }

    /// Position of the endpoint `url` belongs to, if any.
    pub fn index_of(&self, url: &Url) -> Option<usize> {
        self.endpoints.iter().position(|e| e.contains(url))
    }
}
