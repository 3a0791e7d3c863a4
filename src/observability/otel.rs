//! OpenTelemetry trace export.
//!
//! Installs a global `tracing` subscriber whose spans are shipped to an
//! OTLP/HTTP collector.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const SERVICE_NAME_DEFAULT: &str = "sales-agent";

#[derive(Debug, Clone)]
pub struct OtelConfig {
    pub service_name: String,
    pub otlp_endpoint: String,
    pub sample_ratio: f64,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            service_name: SERVICE_NAME_DEFAULT.to_string(),
            otlp_endpoint: "http://localhost:4318".to_string(),
            sample_ratio: 1.0,
        }
    }
}

impl OtelConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    pub fn with_sample_ratio(mut self, ratio: f64) -> Self {
        self.sample_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Reads the standard `OTEL_*` variables over the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
            config.otlp_endpoint = endpoint;
        }
        if let Ok(name) = std::env::var("OTEL_SERVICE_NAME") {
            config.service_name = name;
        }
        if let Ok(ratio) = std::env::var("OTEL_TRACES_SAMPLER_ARG")
            && let Ok(r) = ratio.parse::<f64>()
        {
            config.sample_ratio = r.clamp(0.0, 1.0);
        }
        config
    }

    fn sampler(&self) -> Sampler {
        match self.sample_ratio {
            r if r >= 1.0 => Sampler::AlwaysOn,
            r if r <= 0.0 => Sampler::AlwaysOff,
            r => Sampler::TraceIdRatioBased(r),
        }
    }

    fn resource(&self) -> Resource {
        Resource::builder()
            .with_attributes([
                KeyValue::new(SERVICE_NAME, self.service_name.clone()),
                KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
            ])
            .build()
    }
}

/// Keeps the tracer provider alive; call [`OtelGuard::shutdown`] before exit to flush.
pub struct OtelGuard {
    provider: SdkTracerProvider,
}

impl OtelGuard {
    pub fn shutdown(self) {
        if let Err(e) = self.provider.shutdown() {
            tracing::warn!(error = ?e, "Failed to shut down tracer provider");
        }
    }
}

/// Installs the global subscriber with OTLP export and an optional console layer.
pub fn init_tracing_subscriber(
    config: &OtelConfig,
    with_console: bool,
) -> Result<OtelGuard, OtelError> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let exporter = SpanExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(format!("{}/v1/traces", config.otlp_endpoint))
        .build()
        .map_err(|e| OtelError::Init(format!("Failed to create span exporter: {}", e)))?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(config.sampler())
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(config.resource())
        .build();
    global::set_tracer_provider(provider.clone());

    let tracer = provider.tracer(SERVICE_NAME_DEFAULT);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = with_console.then(|| tracing_subscriber::fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(OpenTelemetryLayer::new(tracer))
        .try_init()
        .map_err(|e| OtelError::Init(format!("Failed to init subscriber: {}", e)))?;

    Ok(OtelGuard { provider })
}

#[derive(Debug, thiserror::Error)]
pub enum OtelError {
    #[error("OpenTelemetry initialization failed: {0}")]
    Init(String),
}
