//! Prometheus metrics and structured logging.
//!
//! - `init_logging`: tracing subscriber (JSON in production, pretty otherwise)
//! - `Metrics`: static facade over the lifecycle counters and gauges
//! - `render_metrics`: text exposition for the `/metrics` endpoint

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::{render_metrics, Metrics};
