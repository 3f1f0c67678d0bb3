//! Powers client facade.
//!
//! Ties the readiness engine, the organization registry and the deployment
//! sequencer to one ledger connection, and carries the ambient pieces an
//! operator-facing tool needs: TOML configuration, tracing spans and
//! Prometheus metrics.

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod tracing_spans;

pub use client::PowersClient;
pub use config::ClientConfig;
pub use error::ClientError;
pub use metrics::ClientMetrics;
