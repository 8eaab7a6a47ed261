//! Prometheus metrics and structured logging for swapwatch.
//!
//! - Prometheus metrics for polling cycles, upstream requests, completions
//! - Structured JSON logging with tracing

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
