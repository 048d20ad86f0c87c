//! Failover retryer.
//!
//! # Responsibilities
//! - Run one logical call as a bounded sequence of attempts across endpoints
//! - Retry the same endpoint with backoff, then fail over to the next one
//! - Follow RedirectOther once without spending failover budget
//! - Report every outcome to the host events sink
//!
//! # Design Decisions
//! - The endpoint order is shuffled once, at construction
//! - Per-call counters live in CallAttemptState; where the next call starts is up to the selector
//! - Only 2xx counts as success; any other non-QoS response is returned to the caller untouched
//! - A failover never revisits an endpoint the call already gave up on

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

use crate::config::schema::ServerQos;
use crate::config::validation::ClientResiliencyConfig;
use crate::health::registry::HostEventsSink;
use crate::http::transport::{OutboundRequest, Transport, TransportError, TransportResponse};
use crate::node_selection::{EndpointError, EndpointSet, NodeSelector};
use crate::observability::metrics;
use crate::qos::{classify, QosSignal};
use crate::resilience::backoff::BackoffPolicy;

/// The last failure seen before a call gave up.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallFailure {
    #[error(transparent)]
    Transport(TransportError),
    #[error("{0}")]
    Qos(QosSignal),
}

impl CallFailure {
    /// Server-advertised wait, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CallFailure::Qos(signal) => signal.retry_after(),
            CallFailure::Transport(_) => None,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            CallFailure::Transport(_) => "transport_error",
            CallFailure::Qos(_) => "qos",
        }
    }
}

/// Why a call did not produce a usable response.
#[derive(Debug, Error)]
pub enum FailoverError {
    #[error("no nodes available for {service} after {attempts} attempts, last failure: {last}")]
    Exhausted {
        service: String,
        attempts: u32,
        #[source]
        last: Box<CallFailure>,
    },
    #[error("server signalled {0}")]
    Qos(QosSignal),
    #[error("remote returned status {status}")]
    Remote {
        status: u16,
        response: TransportResponse,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("invalid request target: {0}")]
    InvalidTarget(#[from] url::ParseError),
}

/// Progress of one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallAttemptState {
    /// Endpoint currently being tried.
    pub index: usize,
    /// Consecutive failures against `index`.
    pub failed_attempts_for_current: u32,
    /// Distinct endpoints given up on during this call.
    pub failed_servers: usize,
}

impl CallAttemptState {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            failed_attempts_for_current: 0,
            failed_servers: 0,
        }
    }
}

/// Executes calls against a set of equivalent endpoints.
pub struct FailoverRetryer<T> {
    service_name: String,
    endpoints: EndpointSet,
    selector: Box<dyn NodeSelector>,
    backoff: Box<dyn BackoffPolicy>,
    server_qos: ServerQos,
    transport: T,
    host_events: Option<Arc<dyn HostEventsSink>>,
}

impl<T> fmt::Debug for FailoverRetryer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailoverRetryer")
            .field("service_name", &self.service_name)
            .field("endpoints", &self.endpoints)
            .field("selector", &self.selector)
            .field("backoff", &self.backoff)
            .field("server_qos", &self.server_qos)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> FailoverRetryer<T> {
    /// Build a retryer from validated configuration. The endpoint order is shuffled.
    pub fn new(
        service_name: impl Into<String>,
        config: &ClientResiliencyConfig,
        transport: T,
    ) -> Result<Self, EndpointError> {
        let endpoints = EndpointSet::shuffled(config.uris().to_vec())?;
        Ok(Self::from_parts(
            service_name,
            endpoints,
            config.node_selector(),
            config.backoff_policy(),
            transport,
        )
        .with_server_qos(config.server_qos()))
    }

    pub fn from_parts(
        service_name: impl Into<String>,
        endpoints: EndpointSet,
        selector: Box<dyn NodeSelector>,
        backoff: Box<dyn BackoffPolicy>,
        transport: T,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            endpoints,
            selector,
            backoff,
            server_qos: ServerQos::AutomaticRetry,
            transport,
            host_events: None,
        }
    }

    pub fn with_host_events(mut self, sink: Arc<dyn HostEventsSink>) -> Self {
        self.host_events = Some(sink);
        self
    }

    pub fn with_server_qos(mut self, server_qos: ServerQos) -> Self {
        self.server_qos = server_qos;
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn endpoints(&self) -> &EndpointSet {
        &self.endpoints
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fresh per-call state starting at the selector's current index.
    pub fn new_call_state(&self) -> CallAttemptState {
        CallAttemptState::new(self.selector.start_index(&self.endpoints))
    }

    /// Execute one logical call.
    pub async fn execute(&self, request: &OutboundRequest) -> Result<TransportResponse, FailoverError> {
        let mut state = self.new_call_state();
        self.execute_with_state(request, &mut state).await
    }

    /// Execute one logical call, exposing its attempt state to the caller.
    pub async fn execute_with_state(
        &self,
        request: &OutboundRequest,
        state: &mut CallAttemptState,
    ) -> Result<TransportResponse, FailoverError> {
        let len = self.endpoints.len();
        let mut attempts: u32 = 0;
        let mut given_up = vec![false; len];
        // Redirect target for the next attempt, and whether it lies outside the endpoint set.
        let mut redirect: Option<(Url, bool)> = None;
        let mut redirected = false;
        state.index %= len;

        loop {
            let (target, foreign) = match redirect.take() {
                Some(next) => next,
                None => (self.endpoints.get(state.index).resolve(&request.path_and_query)?, false),
            };
            attempts += 1;

            let started = Instant::now();
            let failure = match self.transport.send(&target, request).await {
                Ok(response) => {
                    self.record(&target, response.status, started.elapsed());
                    match classify(response.status, &response.headers) {
                        None if (200..300).contains(&response.status) => {
                            self.selector.succeeded(state.index);
                            state.failed_attempts_for_current = 0;
                            state.failed_servers = 0;
                            metrics::record_attempt(&self.service_name, "success");
                            return Ok(response);
                        }
                        None => {
                            self.selector.succeeded(state.index);
                            metrics::record_attempt(&self.service_name, "remote_error");
                            return Err(FailoverError::Remote {
                                status: response.status,
                                response,
                            });
                        }
                        Some(QosSignal::RedirectOther { target: next, .. }) if !redirected => {
                            redirected = true;
                            let known = self.endpoints.index_of(&next);
                            if let Some(index) = known {
                                state.index = index;
                                state.failed_attempts_for_current = 0;
                                self.selector.pin(index);
                            }
                            tracing::debug!(
                                service = %self.service_name,
                                from = %target,
                                to = %next,
                                "Following redirect to other node"
                            );
                            metrics::record_attempt(&self.service_name, "redirect");
                            redirect = Some((next, known.is_none()));
                            continue;
                        }
                        Some(signal) if signal.forbids_retry() => {
                            metrics::record_attempt(&self.service_name, "qos");
                            return Err(FailoverError::Qos(signal));
                        }
                        Some(signal)
                            if signal.is_retryable()
                                && self.server_qos == ServerQos::Propagate429And503ToCaller =>
                        {
                            metrics::record_attempt(&self.service_name, "qos");
                            return Err(FailoverError::Qos(signal));
                        }
                        Some(signal) => CallFailure::Qos(signal),
                    }
                }
                Err(e) => {
                    self.record_io_exception(&target);
                    if !e.is_retryable() {
                        metrics::record_attempt(&self.service_name, "transport_error");
                        return Err(FailoverError::Transport(e));
                    }
                    CallFailure::Transport(e)
                }
            };
            metrics::record_attempt(&self.service_name, failure.outcome());

            // A redirect target outside the endpoint set is not charged to the node that sent us there.
            if foreign {
                tracing::info!(
                    service = %self.service_name,
                    redirect = %target,
                    node = %self.endpoints.get(state.index),
                    error = %failure,
                    "Redirect target failed, returning to node"
                );
                continue;
            }

            state.failed_attempts_for_current += 1;
            if let Some(computed) = self.backoff.backoff(state.failed_attempts_for_current) {
                let delay = failure.retry_after().unwrap_or(computed);
                tracing::info!(
                    service = %self.service_name,
                    endpoint = %target,
                    attempt = state.failed_attempts_for_current,
                    delay = ?delay,
                    error = %failure,
                    "Retrying same node after backoff"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            self.selector.failed(state.index);
            given_up[state.index] = true;
            state.failed_servers += 1;
            let next = if state.failed_servers >= len {
                None
            } else {
                self.selector.next_index(&self.endpoints, state.index, &given_up)
            };
            let Some(next) = next else {
                tracing::warn!(
                    service = %self.service_name,
                    attempts,
                    error = %failure,
                    "All nodes failed, giving up"
                );
                metrics::record_exhausted(&self.service_name);
                return Err(FailoverError::Exhausted {
                    service: self.service_name.clone(),
                    attempts,
                    last: Box::new(failure),
                });
            };

            state.index = next;
            state.failed_attempts_for_current = 0;
            self.selector.pin(state.index);
            tracing::info!(
                service = %self.service_name,
                failed = %target,
                next = %self.endpoints.get(state.index),
                error = %failure,
                "Failing over to next node"
            );
            metrics::record_failover(&self.service_name);
        }
    }

    fn record(&self, target: &Url, status: u16, latency: Duration) {
        if let Some(sink) = &self.host_events {
            let (host, port) = host_and_port(target);
            sink.record(&self.service_name, host, port, status, latency);
        }
    }

    fn record_io_exception(&self, target: &Url) {
        if let Some(sink) = &self.host_events {
            let (host, port) = host_and_port(target);
            sink.record_io_exception(&self.service_name, host, port);
        }
    }
}

fn host_and_port(url: &Url) -> (&str, u16) {
    (url.host_str().unwrap_or(""), url.port_or_known_default().unwrap_or(0))
}
