//! idgate Observability
//!
//! This crate provides observability features for the client core:
//! - Structured logging setup (tracing-subscriber)
//! - Client metrics (Prometheus)
//!
//! Exporting metrics is left to the host process; [`ClientMetrics::render`]
//! produces the text exposition format.

pub mod logging;
pub mod metrics;

pub use logging::{LoggingConfig, LoggingError, init_logging};
pub use metrics::ClientMetrics;
