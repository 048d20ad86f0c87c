//! Per-feature rate limiting.
//!
//! # Responsibilities
//! - One token bucket per feature key, refilled continuously
//! - Admit requests without a feature key unconditionally
//! - Switch limiting off when too many distinct features show up
//!
//! # Design Decisions
//! - Buckets hold at most one second of burst credit
//! - A new bucket starts with a single token
//! - Fail open on capacity overflow; never reject because of memory pressure

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::observability::metrics;
use crate::qos::QosSignal;

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(initial: f64) -> Self {
        Self {
            tokens: initial,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Rejected,
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Pulls the feature key out of a request.
pub type FeatureExtractor<R> = Arc<dyn Fn(&R) -> Option<String> + Send + Sync>;

/// Token-bucket limiter keyed by logical feature.
pub struct FeatureRateLimiter<R> {
    buckets: DashMap<String, Mutex<TokenBucket>>,
    extractor: FeatureExtractor<R>,
    requests_per_second: f64,
    max_features: usize,
    disabled: AtomicBool,
}

impl<R> std::fmt::Debug for FeatureRateLimiter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureRateLimiter")
            .field("requests_per_second", &self.requests_per_second)
            .field("max_features", &self.max_features)
            .field("tracked_features", &self.buckets.len())
            .field("disabled", &self.disabled.load(Ordering::Relaxed))
            .finish()
    }
}

impl<R> FeatureRateLimiter<R> {
    /// Default number of distinct features tracked before limiting is switched off.
    pub const DEFAULT_MAX_FEATURES: usize = 1_000;

    pub fn new(requests_per_second: u32, extractor: FeatureExtractor<R>) -> Self {
        Self::with_max_features(requests_per_second, Self::DEFAULT_MAX_FEATURES, extractor)
    }

    pub fn with_max_features(requests_per_second: u32, max_features: usize, extractor: FeatureExtractor<R>) -> Self {
        Self {
            buckets: DashMap::new(),
            extractor,
            requests_per_second: f64::from(requests_per_second),
            max_features,
            disabled: AtomicBool::new(false),
        }
    }

    /// Admit or reject `request`.
    pub fn admit(&self, request: &R) -> Admission {
        match (self.extractor)(request) {
            Some(feature) => self.admit_feature(&feature),
            None => Admission::Allowed,
        }
    }

    /// Admit or reject one request for `feature`.
    pub fn admit_feature(&self, feature: &str) -> Admission {
        if !self.is_limiting() {
            return Admission::Allowed;
        }

        if let Some(bucket) = self.buckets.get(feature) {
            return self.acquire(&bucket);
        }

        if self.buckets.len() >= self.max_features {
            self.disabled.store(true, Ordering::SeqCst);
            self.buckets.clear();
            tracing::warn!(
                max_features = self.max_features,
                "Too many distinct features, disabling rate limiting"
            );
            return Admission::Allowed;
        }

        let admission = {
            let bucket = self
                .buckets
                .entry(feature.to_string())
                .or_insert_with(|| Mutex::new(TokenBucket::new(1.0)));
            self.acquire(&bucket)
        };
        // Limiting may have been switched off while the bucket was being created.
        if !self.is_limiting() {
            self.buckets.remove(feature);
            return Admission::Allowed;
        }
        admission
    }

    /// False once limiting has been switched off.
    pub fn is_limiting(&self) -> bool {
        !self.disabled.load(Ordering::SeqCst)
    }

    pub fn tracked_features(&self) -> usize {
        self.buckets.len()
    }

    fn acquire(&self, bucket: &Mutex<TokenBucket>) -> Admission {
        let mut bucket = bucket.lock().unwrap_or_else(PoisonError::into_inner);
        if bucket.try_acquire(self.requests_per_second, self.requests_per_second) {
            Admission::Allowed
        } else {
            Admission::Rejected
        }
    }
}

/// Feature extractor reading a request header.
pub fn header_feature(name: impl Into<String>) -> FeatureExtractor<Request<Body>> {
    let name = name.into();
    Arc::new(move |request: &Request<Body>| {
        request
            .headers()
            .get(name.as_str())
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    })
}

/// Middleware function for per-feature rate limiting.
pub async fn feature_rate_limit_middleware(
    State(limiter): State<Arc<FeatureRateLimiter<Request<Body>>>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if limiter.admit(&request).is_allowed() {
        return next.run(request).await;
    }

    let feature = (limiter.extractor)(&request).unwrap_or_default();
    tracing::warn!(feature = %feature, "Rate limit exceeded");
    metrics::record_rate_limited(&feature);
    QosSignal::throttle().into_response()
}
