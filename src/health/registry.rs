//! Bounded, self-evicting registry of per-host metrics.
//!
//! # Responsibilities
//! - Lazily create a [`HostMetric`] on the first observation of a (service, host, port)
//! - Expire entries that have not been accessed for a while
//! - Bound the number of tracked hosts, evicting the least recently accessed
//!
//! # Design Decisions
//! - Eviction is lossy; metrics for cold hosts simply disappear
//! - Recording never fails the caller: errors are logged and the call becomes a no-op
//! - DashMap shards keep different hosts from contending

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;

use crate::health::metric::{HostMetric, HostMetricSnapshot};

/// Default maximum number of tracked hosts.
pub const DEFAULT_MAX_ENTRIES: usize = 1_000;
/// Default idle time after which a host's metrics are dropped.
pub const DEFAULT_EXPIRE_AFTER_ACCESS: Duration = Duration::from_secs(24 * 60 * 60);

/// Receives per-host call outcomes.
pub trait HostEventsSink: Send + Sync {
    fn record(&self, service: &str, host: &str, port: u16, status: u16, latency: Duration);
    fn record_io_exception(&self, service: &str, host: &str, port: u16);
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("service name must not be empty")]
    EmptyService,
    #[error("hostname must not be empty")]
    EmptyHost,
    #[error("registry capacity is zero")]
    ZeroCapacity,
}

/// Identity of a tracked host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct HostKey {
    pub service: String,
    pub host: String,
    pub port: u16,
}

impl HostKey {
    pub fn new(service: &str, host: &str, port: u16) -> Result<Self, RegistryError> {
        if service.is_empty() {
            return Err(RegistryError::EmptyService);
        }
        if host.is_empty() {
            return Err(RegistryError::EmptyHost);
        }
        Ok(Self {
            service: service.to_string(),
            host: host.to_ascii_lowercase(),
            port,
        })
    }
}

#[derive(Debug)]
struct Entry {
    metric: Arc<HostMetric>,
    /// Millis since the registry's epoch.
    last_access: AtomicU64,
}

/// Per-(service, host, port) response-code health.
#[derive(Debug)]
pub struct HostHealthRegistry {
    entries: DashMap<HostKey, Entry>,
    max_entries: usize,
    expire_after_access: Duration,
    epoch: Instant,
}

impl Default for HostHealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HostHealthRegistry {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_ENTRIES, DEFAULT_EXPIRE_AFTER_ACCESS)
    }

    pub fn with_limits(max_entries: usize, expire_after_access: Duration) -> Self {
        Self {
            entries: DashMap::with_capacity(64.min(max_entries)),
            max_entries,
            expire_after_access,
            epoch: Instant::now(),
        }
    }

    /// Snapshot of one host, if it is currently tracked.
    pub fn query(&self, service: &str, host: &str, port: u16) -> Option<HostMetricSnapshot> {
        let key = HostKey::new(service, host, port).ok()?;
        self.live(&key, self.now_millis()).map(|m| m.snapshot())
    }

    /// Snapshots of every tracked host.
    pub fn metrics(&self) -> Vec<HostMetricSnapshot> {
        let now = self.now_millis();
        self.entries
            .iter()
            .filter(|e| !self.is_expired(e.value(), now))
            .map(|e| e.value().metric.snapshot())
            .collect()
    }

    /// Number of tracked hosts, including ones not yet purged after expiry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get or create the metric for `key`.
    fn load(&self, key: HostKey) -> Result<Arc<HostMetric>, RegistryError> {
        if self.max_entries == 0 {
            return Err(RegistryError::ZeroCapacity);
        }

        let now = self.now_millis();
        if let Some(metric) = self.live(&key, now) {
            return Ok(metric);
        }

        // Either absent or expired; an expired entry starts over.
        self.entries.remove_if(&key, |_, e| self.is_expired(e, now));
        if self.entries.len() >= self.max_entries {
            self.make_room(now, self.max_entries - 1, None);
        }

        let metric = {
            let entry = self.entries.entry(key.clone()).or_insert_with(|| Entry {
                metric: Arc::new(HostMetric::new(key.clone())),
                last_access: AtomicU64::new(now),
            });
            entry.last_access.store(now, Ordering::Relaxed);
            entry.metric.clone()
        };

        // Concurrent first observations can each pass the check above.
        if self.entries.len() > self.max_entries {
            self.make_room(now, self.max_entries, Some(&key));
        }
        Ok(metric)
    }

    /// Returns the metric if present and not expired, refreshing its access time.
    fn live(&self, key: &HostKey, now: u64) -> Option<Arc<HostMetric>> {
        let entry = self.entries.get(key)?;
        if self.is_expired(&entry, now) {
            return None;
        }
        entry.last_access.store(now, Ordering::Relaxed);
        Some(entry.metric.clone())
    }

    /// Drop expired entries, then the least recently accessed ones until at most `limit` remain.
    fn make_room(&self, now: u64, limit: usize, keep: Option<&HostKey>) {
        self.entries.retain(|_, e| !self.is_expired(e, now));

        while self.entries.len() > limit {
            let coldest = self
                .entries
                .iter()
                .filter(|e| Some(e.key()) != keep)
                .min_by_key(|e| e.value().last_access.load(Ordering::Relaxed))
                .map(|e| e.key().clone());
            match coldest {
                Some(key) => {
                    tracing::debug!(service = %key.service, host = %key.host, port = key.port, "Evicting host metrics");
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    fn is_expired(&self, entry: &Entry, now: u64) -> bool {
        let idle = now.saturating_sub(entry.last_access.load(Ordering::Relaxed));
        u128::from(idle) >= self.expire_after_access.as_millis()
    }

    fn now_millis(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl HostEventsSink for HostHealthRegistry {
    fn record(&self, service: &str, host: &str, port: u16, status: u16, latency: Duration) {
        match HostKey::new(service, host, port).and_then(|key| self.load(key)) {
            Ok(metric) => metric.record(status, latency),
            Err(e) => {
                tracing::warn!(host = %host, port = port, error = %e, "Unable to record metrics for host and port");
            }
        }
    }

    fn record_io_exception(&self, service: &str, host: &str, port: u16) {
        match HostKey::new(service, host, port).and_then(|key| self.load(key)) {
            Ok(metric) => metric.record_io_exception(),
            Err(e) => {
                tracing::warn!(host = %host, port = port, error = %e, "Unable to record IO exception for host and port");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_qos_statuses_use_qos_counter() {
        let registry = HostHealthRegistry::new();
        registry.record("svc", "a.example", 443, 503, MS);
        registry.record("svc", "a.example", 443, 429, MS);
        registry.record("svc", "a.example", 443, 500, MS);

        let snap = registry.query("svc", "a.example", 443).unwrap();
        assert_eq!(snap.qos.count, 2);
        assert_eq!(snap.server_error.count, 1);
        assert_eq!(snap.client_error.count, 0);
    }

    #[test]
    fn test_hosts_are_tracked_independently() {
        let registry = HostHealthRegistry::new();
        registry.record("svc", "a.example", 443, 200, MS);
        registry.record_io_exception("svc", "b.example", 443);
        registry.record("other", "a.example", 443, 404, MS);

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.query("svc", "a.example", 443).unwrap().successful.count, 1);
        assert_eq!(registry.query("svc", "b.example", 443).unwrap().io_exceptions, 1);
        assert_eq!(registry.query("other", "a.example", 443).unwrap().client_error.count, 1);
        assert!(registry.query("svc", "a.example", 8443).is_none());
    }

    #[test]
    fn test_invalid_key_is_a_noop() {
        let registry = HostHealthRegistry::new();
        registry.record("svc", "", 443, 200, MS);
        registry.record_io_exception("", "a.example", 443);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_zero_capacity_never_fails_caller() {
        let registry = HostHealthRegistry::with_limits(0, DEFAULT_EXPIRE_AFTER_ACCESS);
        registry.record("svc", "a.example", 443, 200, MS);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_size_bound_evicts_least_recently_accessed() {
        let registry = HostHealthRegistry::with_limits(2, DEFAULT_EXPIRE_AFTER_ACCESS);
        registry.record("svc", "a", 1, 200, MS);
        thread::sleep(Duration::from_millis(5));
        registry.record("svc", "b", 1, 200, MS);
        thread::sleep(Duration::from_millis(5));
        // Touch "a" so "b" is now the coldest.
        registry.record("svc", "a", 1, 200, MS);
        thread::sleep(Duration::from_millis(5));
        registry.record("svc", "c", 1, 200, MS);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.query("svc", "a", 1).unwrap().successful.count, 2);
        assert!(registry.query("svc", "b", 1).is_none());
        assert!(registry.query("svc", "c", 1).is_some());
    }

    #[test]
    fn test_concurrent_new_hosts_respect_size_bound() {
        let registry = Arc::new(HostHealthRegistry::with_limits(4, DEFAULT_EXPIRE_AFTER_ACCESS));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        registry.record("svc", &format!("h{}-{}", t, i), 80, 200, MS);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.len() <= 4);
    }

    #[test]
    fn test_entries_expire_after_access() {
        let registry = HostHealthRegistry::with_limits(10, Duration::from_millis(20));
        registry.record("svc", "a", 1, 200, MS);
        assert!(registry.query("svc", "a", 1).is_some());

        thread::sleep(Duration::from_millis(40));
        assert!(registry.query("svc", "a", 1).is_none());
        assert!(registry.metrics().is_empty());

        // A new observation starts from zero.
        registry.record("svc", "a", 1, 500, MS);
        let snap = registry.query("svc", "a", 1).unwrap();
        assert_eq!(snap.successful.count, 0);
        assert_eq!(snap.server_error.count, 1);
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let registry = Arc::new(HostHealthRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        registry.record("svc", "shared", 80, 200, MS);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.query("svc", "shared", 80).unwrap().successful.count, 800);
    }
}
