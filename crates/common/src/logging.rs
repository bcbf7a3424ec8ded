use crate::config::Environment;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::Layered, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Initialize the tracing subscriber: pretty output for development, JSON for
/// production.
///
/// Filtering follows `RUST_LOG` (defaults to "info").
///
/// An OpenTelemetry layer is always installed; it only exports when a global
/// tracer provider exists (see [`crate::TelemetryGuard`]).
pub fn setup_logging(environment: Environment) {
    init_subscriber(environment, tracing_opentelemetry::layer());
}

pub(crate) fn init_subscriber<L>(environment: Environment, otel_layer: L)
where
    L: Layer<Layered<EnvFilter, Registry>> + Send + Sync + 'static,
{
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer);

    match environment {
        Environment::Production => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_level(true)
                        .with_current_span(true),
                )
                .init();
        }
        Environment::Development => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
                .init();
        }
    }
}
