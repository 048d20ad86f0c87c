//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound connection
//!     → server.rs (Axum setup, rate limit middleware, buffering)
//!     → resilience::failover (endpoint choice, retries)
//!     → transport.rs boundary → client.rs (reqwest, one attempt)
//!     → response.rs (relay response or map QoS/failure to status)
//!     → Send to client
//! ```

pub mod client;
pub mod response;
pub mod server;
pub mod transport;

pub use client::ReqwestTransport;
pub use server::{AppState, GatewayError, GatewayServer};
pub use transport::{OutboundRequest, Transport, TransportError, TransportResponse};
