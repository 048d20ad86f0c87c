//! Maps QoS status codes to typed signals.
//!
//! # Responsibilities
//! - 308 + Location → RedirectOther
//! - 429 [+ Retry-After seconds] → Throttle
//! - 503 → Unavailable
//! - Attach the best-effort QosReason to every signal
//!
//! # Design Decisions
//! - A 308 without a usable Location is a server-side protocol violation: logged, not signalled
//! - A malformed Retry-After only drops the hint, never the Throttle

use std::time::Duration;
use axum::http::HeaderMap;
use url::Url;

use crate::qos::signal::{DueTo, QosReason, QosSignal, RetryHint, DUE_TO_HEADER, RETRY_HINT_HEADER};

const LOCATION: &str = "location";
const RETRY_AFTER: &str = "retry-after";

/// Read-only access to response headers.
pub trait HeaderLookup {
    /// Returns the first value of the named header, if present and valid text.
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderLookup for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.to_str().ok())
    }
}

impl<'a> HeaderLookup for [(&'a str, &'a str)] {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }
}

impl<'a, const N: usize> HeaderLookup for [(&'a str, &'a str); N] {
    fn header(&self, name: &str) -> Option<&str> {
        self.as_slice().header(name)
    }
}

/// Classify a response. Returns `None` for every status that is not a QoS signal.
pub fn classify<H: HeaderLookup + ?Sized>(status: u16, headers: &H) -> Option<QosSignal> {
    match status {
        308 => redirect_other(headers),
        429 => Some(throttle(headers)),
        503 => {
            tracing::debug!("Received 503 response, signalling unavailable node");
            Some(QosSignal::Unavailable { reason: parse_reason(headers) })
        }
        _ => None,
    }
}

fn redirect_other<H: HeaderLookup + ?Sized>(headers: &H) -> Option<QosSignal> {
    let Some(location) = headers.header(LOCATION) else {
        tracing::error!(
            "Retrieved HTTP status code 308 without Location header, cannot perform redirect. \
             This appears to be a server-side protocol violation."
        );
        return None;
    };

    match Url::parse(location) {
        Ok(target) => {
            tracing::debug!("Received 308 response, retrying host at advertised location");
            Some(QosSignal::RedirectOther { target, reason: parse_reason(headers) })
        }
        Err(e) => {
            tracing::error!(location = %location, error = %e, "Failed to parse location header, not performing redirect");
            None
        }
    }
}

fn throttle<H: HeaderLookup + ?Sized>(headers: &H) -> QosSignal {
    let retry_after = headers.header(RETRY_AFTER).and_then(|value| {
        match value.trim().parse::<u64>() {
            Ok(secs) => Some(Duration::from_secs(secs)),
            Err(_) => {
                tracing::debug!(retry_after = %value, "Ignoring malformed Retry-After header");
                None
            }
        }
    });
    tracing::debug!(retry_after = ?retry_after, "Received 429 response, signalling delayed retry");
    QosSignal::Throttle { retry_after, reason: parse_reason(headers) }
}

/// Best-effort parse of the QoS reason headers. Unknown values are ignored.
pub fn parse_reason<H: HeaderLookup + ?Sized>(headers: &H) -> Option<QosReason> {
    let retry_hint = headers.header(RETRY_HINT_HEADER).and_then(|value| {
        let hint = RetryHint::parse(value);
        if hint.is_none() {
            tracing::debug!(value = %value, "Unknown QoS retry hint");
        }
        hint
    });
    let due_to = headers.header(DUE_TO_HEADER).and_then(|value| {
        let due_to = DueTo::parse(value);
        if due_to.is_none() {
            tracing::debug!(value = %value, "Unknown QoS cause");
        }
        due_to
    });

    let reason = QosReason { retry_hint, due_to };
    (!reason.is_empty()).then_some(reason)
}
