//! Gateway tests: axum router driven in-process against mock backends.

use std::sync::Arc;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use resilient_client::config::{validate_config, GatewayConfig};
use resilient_client::health::HostHealthRegistry;
use resilient_client::http::GatewayServer;

mod common;
use common::{start_mock_backend, MockResponse};

fn gateway(config: &GatewayConfig) -> Router {
    let client = validate_config(config).unwrap();
    GatewayServer::new(config, &client, Arc::new(HostHealthRegistry::new()))
        .unwrap()
        .into_router()
}

fn request(path: &str, feature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(path);
    if let Some(feature) = feature {
        builder = builder.header("x-feature", feature);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_forwards_to_backend() {
    let backend = start_mock_backend(MockResponse::new(200, "from backend")).await;
    let mut config = GatewayConfig::default();
    config.client.uris = vec![backend.url()];

    let response = gateway(&config).oneshot(request("/items?id=1", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&body[..], b"from backend");
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_rate_limited_feature_gets_429() {
    let backend = start_mock_backend(MockResponse::new(200, "ok")).await;
    let mut config = GatewayConfig::default();
    config.client.uris = vec![backend.url()];
    config.rate_limit.enabled = true;
    config.rate_limit.requests_per_second = 1;
    let app = gateway(&config);

    let first = app.clone().oneshot(request("/", Some("search"))).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.clone().oneshot(request("/", Some("search"))).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

    let other = app.clone().oneshot(request("/", Some("export"))).await.unwrap();
    assert_eq!(other.status(), StatusCode::OK);

    let unlabelled = app.oneshot(request("/", None)).await.unwrap();
    assert_eq!(unlabelled.status(), StatusCode::OK);
    assert_eq!(backend.hits(), 3);
}

#[tokio::test]
async fn test_exhausted_nodes_return_bad_gateway() {
    let backend = start_mock_backend(MockResponse::new(503, "busy")).await;
    let mut config = GatewayConfig::default();
    config.client.uris = vec![backend.url()];
    config.client.max_num_retries = 1;
    config.client.backoff_slot_size_ms = 1;

    let response = gateway(&config).oneshot(request("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(backend.hits(), 2);
}

#[tokio::test]
async fn test_propagated_throttle_keeps_retry_after() {
    let backend = start_mock_backend(MockResponse::new(429, "").header("Retry-After", "7")).await;
    let mut config = GatewayConfig::default();
    config.client.uris = vec![backend.url()];
    config.client.server_qos = resilient_client::config::ServerQos::Propagate429And503ToCaller;

    let response = gateway(&config).oneshot(request("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "7");
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_host_metrics_endpoint() {
    let backend = start_mock_backend(MockResponse::new(200, "ok")).await;
    let mut config = GatewayConfig::default();
    config.client.uris = vec![backend.url()];
    let app = gateway(&config);

    app.clone().oneshot(request("/", None)).await.unwrap();
    let response = app.oneshot(request("/_resilience/host-metrics", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    let snapshots: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let first = &snapshots.as_array().unwrap()[0];
    assert_eq!(first["service"], "upstream");
    assert_eq!(first["port"], backend.addr.port());
    assert_eq!(first["successful"]["count"], 1);
}
