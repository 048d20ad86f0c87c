//! Metrics collection and exposition.
//!
//! # Metrics
//! - `resilience_attempts_total` (counter): attempts by service, outcome
//! - `resilience_failovers_total` (counter): moves to the next node, by service
//! - `resilience_exhausted_total` (counter): calls that ran out of nodes, by service
//! - `resilience_rate_limited_total` (counter): rejected admissions, by feature
//! - `resilience_host_responses` (gauge): per-host response counts, by service, host, port, family
//! - `resilience_host_io_exceptions` (gauge): per-host I/O failures
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Host metrics are exported periodically from registry snapshots

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::broadcast;

use crate::health::metric::HostMetricSnapshot;
use crate::health::registry::HostHealthRegistry;

pub fn record_attempt(service: &str, outcome: &'static str) {
    metrics::counter!(
        "resilience_attempts_total",
        "service" => service.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_failover(service: &str) {
    metrics::counter!("resilience_failovers_total", "service" => service.to_string()).increment(1);
}

pub fn record_exhausted(service: &str) {
    metrics::counter!("resilience_exhausted_total", "service" => service.to_string()).increment(1);
}

pub fn record_rate_limited(feature: &str) {
    metrics::counter!("resilience_rate_limited_total", "feature" => feature.to_string()).increment(1);
}

/// Publish registry snapshots as gauges.
pub fn export_host_metrics(snapshots: &[HostMetricSnapshot]) {
    for snapshot in snapshots {
        for (family, timer) in snapshot.families() {
            metrics::gauge!(
                "resilience_host_responses",
                "service" => snapshot.service.clone(),
                "host" => snapshot.host.clone(),
                "port" => snapshot.port.to_string(),
                "family" => family.as_str()
            )
            .set(timer.count as f64);
        }
        metrics::gauge!(
            "resilience_host_io_exceptions",
            "service" => snapshot.service.clone(),
            "host" => snapshot.host.clone(),
            "port" => snapshot.port.to_string()
        )
        .set(snapshot.io_exceptions as f64);
    }
}

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Periodically export host metrics until shutdown.
pub async fn run_host_metrics_exporter(
    registry: Arc<HostHealthRegistry>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshots = registry.metrics();
                tracing::trace!(hosts = snapshots.len(), "Exporting host metrics");
                export_host_metrics(&snapshots);
            }
            _ = shutdown.recv() => {
                tracing::debug!("Host metrics exporter stopping");
                break;
            }
        }
    }
}
