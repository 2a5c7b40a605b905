//! Observability: logging, distributed tracing and metrics.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use opentelemetry_otlp::WithExportConfig;
use tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::ObservabilityConfig;

/// Initialize the observability stack.
///
/// `RUST_LOG` wins over `log_level` when set. OTLP export is enabled only
/// when an endpoint is configured.
pub fn init(service_name: &str, config: &ObservabilityConfig) -> anyhow::Result<()> {
    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if config.json_logging {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().pretty().boxed()
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let telemetry_layer = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(endpoint),
                )
                .with_trace_config(
                    opentelemetry_sdk::trace::config().with_resource(
                        opentelemetry_sdk::Resource::new(vec![opentelemetry::KeyValue::new(
                            "service.name",
                            service_name.to_string(),
                        )]),
                    ),
                )
                .install_batch(opentelemetry_sdk::runtime::Tokio)?;

            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .with(telemetry_layer)
        .try_init()?;

    metrics::register_metrics();
    Ok(())
}

/// Shutdown OpenTelemetry.
pub fn shutdown() {
    opentelemetry::global::shutdown_tracer_provider();
}

/// Install the Prometheus recorder and return a handle for `/metrics`.
pub fn install_prometheus() -> anyhow::Result<PrometheusHandle> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}

/// Metric descriptions.
pub mod metrics {
    use metrics::describe_counter;

    /// Register all metric descriptions.
    pub fn register_metrics() {
        describe_counter!(
            "taskgate_policy_decisions_total",
            "Permission gate decisions, by outcome"
        );
        describe_counter!(
            "taskgate_scope_resolutions_total",
            "Organization scope resolutions, by role"
        );
        describe_counter!(
            "taskgate_audit_write_failures_total",
            "Audit entries that could not be persisted"
        );
        describe_counter!(
            "taskgate_errors_total",
            "Errors raised, by code and category"
        );
        describe_counter!(
            "auth_errors_total",
            "Rejected bearer tokens, by error type"
        );
        describe_counter!(
            "auth_success_total",
            "Accepted bearer tokens, by method"
        );
    }
}
