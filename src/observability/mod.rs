//! Tracing spans and engine metrics.
//!
//! Spans are always emitted through `tracing`; the host decides where they
//! go. Enable the `otel` feature to export them over OTLP:
//!
//! ```rust,ignore
//! use sales_agent::observability::{OtelConfig, init_tracing_subscriber};
//!
//! let guard = init_tracing_subscriber(&OtelConfig::from_env(), true)?;
//! // ... run the engine ...
//! guard.shutdown();
//! ```

mod metrics;
#[cfg(feature = "otel")]
mod otel;
pub mod spans;

pub use metrics::{Counter, EngineMetrics, Gauge, Histogram, MetricsSnapshot};
#[cfg(feature = "otel")]
pub use otel::{OtelConfig, OtelError, OtelGuard, SERVICE_NAME_DEFAULT, init_tracing_subscriber};
pub use spans::{ReasoningSpan, ToolCallSpan};
