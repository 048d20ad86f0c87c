//! HTTP gateway setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the forwarding and host-metrics handlers
//! - Wire up middleware (per-feature rate limit, timeout, tracing)
//! - Buffer inbound requests and hand them to the failover retryer
//! - Relay responses, QoS signals and failures back to the caller
//! - Serve until the shutdown signal fires

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::config::schema::GatewayConfig;
use crate::config::validation::ClientResiliencyConfig;
use crate::health::{HostHealthRegistry, HostMetricSnapshot};
use crate::http::client::ReqwestTransport;
use crate::http::response::strip_hop_by_hop;
use crate::http::transport::{OutboundRequest, TransportError};
use crate::lifecycle::wait_for;
use crate::node_selection::EndpointError;
use crate::resilience::FailoverRetryer;
use crate::security::{feature_rate_limit_middleware, header_feature, FeatureRateLimiter};

/// Correlation header added to every forwarded request.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Path of the read-only host metrics endpoint.
pub const HOST_METRICS_PATH: &str = "/_resilience/host-metrics";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to build outbound transport: {0}")]
    Transport(#[from] TransportError),
    #[error("invalid endpoints: {0}")]
    Endpoints(#[from] EndpointError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub retryer: Arc<FailoverRetryer<ReqwestTransport>>,
    pub registry: Arc<HostHealthRegistry>,
    pub max_body_bytes: usize,
}

/// Inbound HTTP gateway in front of the configured nodes.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    /// Build the gateway: transport, retryer, optional rate limiter and router.
    pub fn new(
        config: &GatewayConfig,
        client: &ClientResiliencyConfig,
        registry: Arc<HostHealthRegistry>,
    ) -> Result<Self, GatewayError> {
        let transport = ReqwestTransport::new(&config.timeouts, client.mesh_proxy())?;
        let retryer = FailoverRetryer::new(config.service_name.clone(), client, transport)?
            .with_host_events(registry.clone());

        tracing::info!(
            service = %config.service_name,
            nodes = retryer.endpoints().len(),
            strategy = ?client.node_selection_strategy(),
            max_num_retries = client.max_num_retries(),
            "Failover retryer ready"
        );

        let limiter = config.rate_limit.enabled.then(|| {
            Arc::new(FeatureRateLimiter::with_max_features(
                config.rate_limit.requests_per_second,
                config.rate_limit.max_features,
                header_feature(config.rate_limit.feature_header.clone()),
            ))
        });

        let state = AppState {
            retryer: Arc::new(retryer),
            registry,
            max_body_bytes: config.listener.max_body_bytes,
        };

        Ok(Self {
            router: Self::build_router(config, state, limiter),
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &GatewayConfig,
        state: AppState,
        limiter: Option<Arc<FeatureRateLimiter<Request<Body>>>>,
    ) -> Router {
        let mut router = Router::new()
            .route(HOST_METRICS_PATH, get(host_metrics_handler))
            .fallback(forward_handler)
            .with_state(state);

        if let Some(limiter) = limiter {
            router = router.layer(middleware::from_fn_with_state(limiter, feature_rate_limit_middleware));
        }

        router
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// The assembled router, for embedding or in-process testing.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP gateway starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(wait_for(shutdown))
            .await?;

        tracing::info!("HTTP gateway stopped");
        Ok(())
    }
}

/// Read-only view of the host health registry.
async fn host_metrics_handler(State(state): State<AppState>) -> Json<Vec<HostMetricSnapshot>> {
    Json(state.registry.metrics())
}

/// Forward any request to the remote service through the failover retryer.
async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    let request_id = parts
        .headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Request body rejected");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        headers.insert(X_REQUEST_ID, value);
    }

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        path = %path_and_query,
        "Forwarding request"
    );

    let outbound = OutboundRequest {
        method: parts.method,
        path_and_query,
        headers,
        body,
    };

    let mut response = match state.retryer.execute(&outbound).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Call failed");
            e.into_response()
        }
    };
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}
