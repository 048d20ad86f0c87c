//! Outbound HTTP transport backed by reqwest.
//!
//! # Responsibilities
//! - Send one buffered request to one concrete URL
//! - Never follow redirects itself (308 is a QoS signal)
//! - Route through the mesh proxy when one is configured
//! - Map reqwest failures onto `TransportError`

use std::error::Error as StdError;
use std::time::Duration;
use url::Url;

use crate::config::schema::TimeoutConfig;
use crate::config::validation::MeshProxy;
use crate::http::transport::{OutboundRequest, Transport, TransportError, TransportResponse};

/// `Transport` implementation over a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeouts: &TimeoutConfig, mesh_proxy: Option<&MeshProxy>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.request_secs))
            .redirect(reqwest::redirect::Policy::none());

        if let Some(proxy) = mesh_proxy {
            tracing::info!(mesh_proxy = %proxy, "Routing outbound calls through mesh proxy");
            let proxy = reqwest::Proxy::all(format!("http://{}", proxy)).map_err(classify_error)?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(classify_error)?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, target: &Url, request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .request(request.method.clone(), target.clone())
            .headers(request.headers.clone())
            .body(request.body.clone())
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify_error)?;
        Ok(TransportResponse { status, headers, body })
    }
}

/// Map a reqwest error onto the retryable/non-retryable transport kinds.
pub fn classify_error(e: reqwest::Error) -> TransportError {
    let message = e.to_string();
    if e.is_builder() {
        return TransportError::Other(message);
    }
    if e.is_timeout() {
        return TransportError::Timeout(message);
    }
    if e.is_connect() {
        if caused_by_dns(&e) {
            return TransportError::Dns(message);
        }
        return TransportError::Connect(message);
    }
    TransportError::Aborted(message)
}

fn caused_by_dns(e: &reqwest::Error) -> bool {
    let mut source = e.source();
    while let Some(cause) = source {
        if cause.to_string().contains("dns error") {
            return true;
        }
        source = cause.source();
    }
    false
}
