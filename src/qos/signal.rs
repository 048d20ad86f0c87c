//! Typed QoS signals.

use std::fmt;
use std::time::Duration;
use url::Url;

/// Header carrying the server's retry hint.
pub const RETRY_HINT_HEADER: &str = "qos-retry-hint";
/// Header carrying the cause of a QoS response.
pub const DUE_TO_HEADER: &str = "qos-due-to";

/// Whether the server allows the client to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryHint {
    DoNotRetry,
}

impl RetryHint {
    pub fn parse(value: &str) -> Option<Self> {
        if value.trim().eq_ignore_ascii_case("do-not-retry") {
            Some(RetryHint::DoNotRetry)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RetryHint::DoNotRetry => "do-not-retry",
        }
    }
}

/// What caused the server to emit the QoS response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueTo {
    /// Application-defined cause (e.g. a per-feature rate limit), not server health.
    Custom,
}

impl DueTo {
    pub fn parse(value: &str) -> Option<Self> {
        if value.trim().eq_ignore_ascii_case("custom") {
            Some(DueTo::Custom)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DueTo::Custom => "custom",
        }
    }
}

/// Structured reason attached to a QoS response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QosReason {
    pub retry_hint: Option<RetryHint>,
    pub due_to: Option<DueTo>,
}

impl QosReason {
    pub fn is_empty(&self) -> bool {
        self.retry_hint.is_none() && self.due_to.is_none()
    }

    /// True if the server explicitly asked the client not to retry.
    pub fn forbids_retry(&self) -> bool {
        matches!(self.retry_hint, Some(RetryHint::DoNotRetry))
    }
}

/// A structured interpretation of a QoS status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QosSignal {
    /// 308: retry the request against another URL.
    RedirectOther { target: Url, reason: Option<QosReason> },
    /// 429: slow down, optionally for a server-advertised duration.
    Throttle { retry_after: Option<Duration>, reason: Option<QosReason> },
    /// 503: the node cannot serve the request right now.
    Unavailable { reason: Option<QosReason> },
}

impl QosSignal {
    pub fn throttle() -> Self {
        QosSignal::Throttle { retry_after: None, reason: None }
    }

    pub fn unavailable() -> Self {
        QosSignal::Unavailable { reason: None }
    }

    pub fn reason(&self) -> Option<&QosReason> {
        match self {
            QosSignal::RedirectOther { reason, .. }
            | QosSignal::Throttle { reason, .. }
            | QosSignal::Unavailable { reason } => reason.as_ref(),
        }
    }

    /// The HTTP status code this signal is carried by.
    pub fn status_code(&self) -> u16 {
        match self {
            QosSignal::RedirectOther { .. } => 308,
            QosSignal::Throttle { .. } => 429,
            QosSignal::Unavailable { .. } => 503,
        }
    }

    /// Throttle and Unavailable are retried; RedirectOther is followed instead.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QosSignal::Throttle { .. } | QosSignal::Unavailable { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            QosSignal::Throttle { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn forbids_retry(&self) -> bool {
        self.reason().is_some_and(QosReason::forbids_retry)
    }
}

impl fmt::Display for QosSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QosSignal::RedirectOther { target, .. } => write!(f, "retry other: {}", target),
            QosSignal::Throttle { retry_after: Some(d), .. } => {
                write!(f, "throttled, retry after {}s", d.as_secs())
            }
            QosSignal::Throttle { retry_after: None, .. } => write!(f, "throttled"),
            QosSignal::Unavailable { .. } => write!(f, "unavailable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_parsing_is_lenient() {
        assert_eq!(RetryHint::parse(" Do-Not-Retry "), Some(RetryHint::DoNotRetry));
        assert_eq!(RetryHint::parse("maybe"), None);
        assert_eq!(DueTo::parse("CUSTOM"), Some(DueTo::Custom));
        assert_eq!(DueTo::parse(""), None);
    }

    #[test]
    fn test_signal_properties() {
        let throttle = QosSignal::Throttle {
            retry_after: Some(Duration::from_secs(5)),
            reason: Some(QosReason { retry_hint: Some(RetryHint::DoNotRetry), due_to: None }),
        };
        assert_eq!(throttle.status_code(), 429);
        assert!(throttle.is_retryable());
        assert!(throttle.forbids_retry());
        assert_eq!(throttle.retry_after(), Some(Duration::from_secs(5)));
        assert_eq!(throttle.to_string(), "throttled, retry after 5s");

        let redirect = QosSignal::RedirectOther {
            target: Url::parse("http://x").unwrap(),
            reason: None,
        };
        assert!(!redirect.is_retryable());
        assert!(!redirect.forbids_retry());
        assert_eq!(QosSignal::unavailable().status_code(), 503);
    }
}
