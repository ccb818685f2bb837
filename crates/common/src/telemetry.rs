//! Logging and distributed-tracing bootstrap shared by all binaries.
//!
//! Installs a `tracing` subscriber made of an env filter, a fmt layer and an
//! OpenTelemetry layer, and registers the W3C TraceContext + Baggage
//! propagator used to carry contexts across the queue and HTTP hops.

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::{Sampler, TracerProvider};
use opentelemetry_sdk::{Resource, runtime};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::AppConfig;

/// Flushes and shuts down the tracer provider when dropped.
///
/// Keep it alive for the whole lifetime of `main`.
pub struct TelemetryGuard {
    provider: TracerProvider,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Err(e) = self.provider.shutdown() {
            tracing::warn!(error = %e, "Failed to shut down tracer provider");
        }
    }
}

/// Register the global text-map propagator (W3C TraceContext + Baggage).
pub fn init_propagator() {
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));
}

/// Initialize logging and tracing for one process role.
///
/// `service_name` identifies the role in the trace backend. `default_filter`
/// is used when `RUST_LOG` is not set. Spans are exported over OTLP/gRPC only
/// when an endpoint is configured.
pub fn init_telemetry(
    service_name: &'static str,
    default_filter: &str,
    config: &AppConfig,
) -> anyhow::Result<TelemetryGuard> {
    init_propagator();

    let mut builder = TracerProvider::builder()
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name,
        )]));

    if let Some(endpoint) = &config.otlp_endpoint {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint.clone())
            .build()?;
        builder = builder.with_batch_exporter(exporter, runtime::Tokio);
    }

    let provider = builder.build();
    global::set_tracer_provider(provider.clone());

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let otel_layer = tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name));
    let registry = tracing_subscriber::registry().with(filter).with(otel_layer);

    if config.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }

    tracing::info!(
        service = service_name,
        exporter = config.otlp_endpoint.as_deref().unwrap_or("none"),
        "Telemetry initialized"
    );

    Ok(TelemetryGuard { provider })
}
