use crate::error::{CenQueryError, Result};
use opentelemetry::{trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use std::env;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const ENABLE_TRACING_VAR: &str = "CENQUERY_ENABLE_TRACING";

const ENDPOINT_VARS: [&str; 2] = ["PHOENIX_COLLECTOR_ENDPOINT", "OTEL_EXPORTER_OTLP_ENDPOINT"];

/// keeps the span exporter alive; flushes it when dropped
pub struct OtelGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

impl OtelGuard {
    pub fn is_exporting(&self) -> bool {
        self.tracer_provider.is_some()
    }
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("error shutting down tracer provider: {}", e);
            }
        }
    }
}

fn flag_enabled(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

fn export_endpoint() -> Option<String> {
    ENDPOINT_VARS
        .iter()
        .filter_map(|var| env::var(var).ok())
        .find(|v| !v.trim().is_empty())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
}

/// install the global subscriber. logs go to stderr so stdout stays
/// machine-readable; spans are exported over otlp only when enabled and an
/// endpoint is configured.
pub fn init_tracing(service_name: &str) -> Result<OtelGuard> {
    let enabled = env::var(ENABLE_TRACING_VAR)
        .map(|v| flag_enabled(&v))
        .unwrap_or(false);

    let endpoint = match (enabled, export_endpoint()) {
        (true, Some(endpoint)) => endpoint,
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(std::io::stderr)
                .finish()
                .try_init()
                .map_err(|e| CenQueryError::Tracing(e.to_string()))?;

            tracing::debug!(service = service_name, "basic logging initialized");
            return Ok(OtelGuard {
                tracer_provider: None,
            });
        }
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&endpoint)
        .build()
        .map_err(|e| CenQueryError::Tracing(format!("exporter build failed: {}", e)))?;

    let resource = Resource::builder_empty()
        .with_attribute(KeyValue::new("service.name", service_name.to_string()))
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    let telemetry = tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.to_string()));

    tracing_subscriber::registry()
        .with(telemetry)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter())
        .try_init()
        .map_err(|e| CenQueryError::Tracing(e.to_string()))?;

    tracing::info!(service = service_name, endpoint = %endpoint, "opentelemetry tracing initialized");

    Ok(OtelGuard {
        tracer_provider: Some(provider),
    })
}
