//! Per-host response outcome counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use serde::Serialize;

use crate::health::registry::HostKey;

/// Outcome bucket a response is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFamily {
    Informational,
    Successful,
    Redirection,
    ClientError,
    ServerError,
    /// 429 and 503, which take priority over the 4xx/5xx buckets.
    Qos,
    Other,
}

impl ResponseFamily {
    pub fn of(status: u16) -> Self {
        match status {
            429 | 503 => ResponseFamily::Qos,
            100..=199 => ResponseFamily::Informational,
            200..=299 => ResponseFamily::Successful,
            300..=399 => ResponseFamily::Redirection,
            400..=499 => ResponseFamily::ClientError,
            500..=599 => ResponseFamily::ServerError,
            _ => ResponseFamily::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFamily::Informational => "1xx",
            ResponseFamily::Successful => "2xx",
            ResponseFamily::Redirection => "3xx",
            ResponseFamily::ClientError => "4xx",
            ResponseFamily::ServerError => "5xx",
            ResponseFamily::Qos => "qos",
            ResponseFamily::Other => "other",
        }
    }
}

#[derive(Debug, Default)]
struct Timer {
    count: AtomicU64,
    total_micros: AtomicU64,
}

impl Timer {
    fn update(&self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_micros.fetch_add(micros, Ordering::Relaxed);
    }

    fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            count: self.count.load(Ordering::Relaxed),
            total_micros: self.total_micros.load(Ordering::Relaxed),
        }
    }
}

/// Count and cumulative latency of one outcome bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimerSnapshot {
    pub count: u64,
    pub total_micros: u64,
}

impl TimerSnapshot {
    pub fn mean(&self) -> Option<Duration> {
        (self.count > 0).then(|| Duration::from_micros(self.total_micros / self.count))
    }
}

/// Live counters for calls from one service to one host.
#[derive(Debug)]
pub struct HostMetric {
    key: HostKey,
    informational: Timer,
    successful: Timer,
    redirection: Timer,
    client_error: Timer,
    server_error: Timer,
    qos: Timer,
    other: Timer,
    io_exceptions: AtomicU64,
    last_update_millis: AtomicU64,
}

impl HostMetric {
    pub(crate) fn new(key: HostKey) -> Self {
        Self {
            key,
            informational: Timer::default(),
            successful: Timer::default(),
            redirection: Timer::default(),
            client_error: Timer::default(),
            server_error: Timer::default(),
            qos: Timer::default(),
            other: Timer::default(),
            io_exceptions: AtomicU64::new(0),
            last_update_millis: AtomicU64::new(epoch_millis()),
        }
    }

    pub fn key(&self) -> &HostKey {
        &self.key
    }

    /// Count a response with the given status code.
    pub fn record(&self, status: u16, latency: Duration) {
        self.timer(ResponseFamily::of(status)).update(latency);
        self.touch();
    }

    /// Count a failed exchange that produced no response.
    pub fn record_io_exception(&self) {
        self.io_exceptions.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn snapshot(&self) -> HostMetricSnapshot {
        HostMetricSnapshot {
            service: self.key.service.clone(),
            host: self.key.host.clone(),
            port: self.key.port,
            informational: self.informational.snapshot(),
            successful: self.successful.snapshot(),
            redirection: self.redirection.snapshot(),
            client_error: self.client_error.snapshot(),
            server_error: self.server_error.snapshot(),
            qos: self.qos.snapshot(),
            other: self.other.snapshot(),
            io_exceptions: self.io_exceptions.load(Ordering::Relaxed),
            last_update_epoch_millis: self.last_update_millis.load(Ordering::Relaxed),
        }
    }

    fn timer(&self, family: ResponseFamily) -> &Timer {
        match family {
            ResponseFamily::Informational => &self.informational,
            ResponseFamily::Successful => &self.successful,
            ResponseFamily::Redirection => &self.redirection,
            ResponseFamily::ClientError => &self.client_error,
            ResponseFamily::ServerError => &self.server_error,
            ResponseFamily::Qos => &self.qos,
            ResponseFamily::Other => &self.other,
        }
    }

    fn touch(&self) {
        self.last_update_millis.store(epoch_millis(), Ordering::Relaxed);
    }
}

/// Read-only view of a [`HostMetric`], suitable for export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostMetricSnapshot {
    pub service: String,
    pub host: String,
    pub port: u16,
    pub informational: TimerSnapshot,
    pub successful: TimerSnapshot,
    pub redirection: TimerSnapshot,
    pub client_error: TimerSnapshot,
    pub server_error: TimerSnapshot,
    pub qos: TimerSnapshot,
    pub other: TimerSnapshot,
    pub io_exceptions: u64,
    pub last_update_epoch_millis: u64,
}

impl HostMetricSnapshot {
    pub fn get(&self, family: ResponseFamily) -> TimerSnapshot {
        match family {
            ResponseFamily::Informational => self.informational,
            ResponseFamily::Successful => self.successful,
            ResponseFamily::Redirection => self.redirection,
            ResponseFamily::ClientError => self.client_error,
            ResponseFamily::ServerError => self.server_error,
            ResponseFamily::Qos => self.qos,
            ResponseFamily::Other => self.other,
        }
    }

    /// Every family with its snapshot, in a stable order.
    pub fn families(&self) -> [(ResponseFamily, TimerSnapshot); 7] {
        [
            (ResponseFamily::Informational, self.informational),
            (ResponseFamily::Successful, self.successful),
            (ResponseFamily::Redirection, self.redirection),
            (ResponseFamily::ClientError, self.client_error),
            (ResponseFamily::ServerError, self.server_error),
            (ResponseFamily::Qos, self.qos),
            (ResponseFamily::Other, self.other),
        ]
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
