//! Resilient gateway.
//!
//! Accepts inbound HTTP, admits it per feature, and forwards it to a set of equivalent
//! nodes with failover, backoff and QoS handling.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request          ┌──────────────────────────────────────────────────┐
//!     ────────────────────────┼─▶ rate_limit ─▶ server ─▶ FailoverRetryer        │
//!                             │                              │    ▲              │
//!                             │                 NodeSelector ┘    │ QosClassifier│
//!                             │                              ▼    │              │
//!     Client Response         │                         ReqwestTransport ────────┼──▶ Nodes
//!     ◀───────────────────────┼── response ◀─────────────────┘                   │
//!                             │                                                  │
//!                             │  HostHealthRegistry ─▶ /_resilience/host-metrics │
//!                             │                     └▶ Prometheus gauges         │
//!                             └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use clap::Parser;
use tokio::net::TcpListener;

use resilient_client::config::load_config;
use resilient_client::health::HostHealthRegistry;
use resilient_client::http::GatewayServer;
use resilient_client::lifecycle::Shutdown;
use resilient_client::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "resilient-gateway")]
#[command(about = "HTTP gateway with client-side failover and QoS handling", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "resilient.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let loaded = load_config(&args.config)?;
    let config = loaded.raw;

    logging::init_logging(&config.observability);
    tracing::info!(
        config = %args.config.display(),
        bind_address = %config.listener.bind_address,
        service = %config.service_name,
        "resilient-gateway v0.1.0 starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let registry = Arc::new(HostHealthRegistry::new());

    if config.observability.metrics_enabled {
        tokio::spawn(metrics::run_host_metrics_exporter(
            registry.clone(),
            Duration::from_secs(config.observability.host_metrics_export_secs.max(1)),
            shutdown.subscribe(),
        ));
    }

    let server = GatewayServer::new(&config, &loaded.client, registry)?;
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server_shutdown = shutdown.subscribe();
    tokio::spawn(shutdown.clone().listen_for_ctrl_c());
    server.run(listener, server_shutdown).await?;

    shutdown.trigger();
    tracing::info!("Shutdown complete");
    Ok(())
}
