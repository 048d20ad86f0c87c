//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn QoS signals into their wire form (status, Retry-After, Location, reason headers)
//! - Map failover errors to appropriate HTTP status codes
//! - Strip hop-by-hop headers from relayed responses
//!
//! # Design Decisions
//! - Exhausted nodes and transport failures surface as 502 Bad Gateway
//! - Non-QoS error responses from a node are relayed unchanged

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::http::transport::TransportResponse;
use crate::qos::signal::{DUE_TO_HEADER, RETRY_HINT_HEADER};
use crate::qos::QosSignal;
use crate::resilience::FailoverError;

/// Headers that describe a single connection and must not be relayed.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

impl IntoResponse for QosSignal {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
        let mut response = Response::new(Body::from(self.to_string()));
        *response.status_mut() = status;
        let headers = response.headers_mut();

        match &self {
            QosSignal::RedirectOther { target, .. } => {
                if let Ok(value) = HeaderValue::from_str(target.as_str()) {
                    headers.insert(header::LOCATION, value);
                }
            }
            QosSignal::Throttle { retry_after: Some(delay), .. } => {
                headers.insert(header::RETRY_AFTER, HeaderValue::from(delay.as_secs()));
            }
            QosSignal::Throttle { retry_after: None, .. } | QosSignal::Unavailable { .. } => {}
        }

        if let Some(reason) = self.reason() {
            if let Some(hint) = reason.retry_hint {
                headers.insert(HeaderName::from_static(RETRY_HINT_HEADER), HeaderValue::from_static(hint.as_str()));
            }
            if let Some(due_to) = reason.due_to {
                headers.insert(HeaderName::from_static(DUE_TO_HEADER), HeaderValue::from_static(due_to.as_str()));
            }
        }
        response
    }
}

impl IntoResponse for TransportResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);
        let mut headers = self.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

impl IntoResponse for FailoverError {
    fn into_response(self) -> Response {
        match self {
            FailoverError::Qos(signal) => signal.into_response(),
            FailoverError::Remote { response, .. } => response.into_response(),
            FailoverError::InvalidTarget(e) => {
                (StatusCode::BAD_REQUEST, format!("Invalid request target: {}", e)).into_response()
            }
            e @ (FailoverError::Exhausted { .. } | FailoverError::Transport(_)) => {
                (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
            }
        }
    }
}
