use common::{TelemetryGuard, setup_logging};
use gateway::{config::GatewayConfig, routes, server, state::AppState};
use inference::{Detector, ObjectDetector, OrtBackend};
use std::sync::Arc;

const SERVICE_NAME: &str = "ai-verification";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env()?;

    let _telemetry = match &config.otel_endpoint {
        Some(endpoint) => Some(TelemetryGuard::init(
            SERVICE_NAME,
            endpoint,
            config.environment,
        )?),
        None => {
            setup_logging(config.environment);
            None
        }
    };

    tracing::info!(
        environment = config.environment.as_str(),
        model_path = %config.inference.model_path,
        execution_provider = %config.inference.execution_provider,
        confidence_threshold = config.inference.confidence_threshold,
        "Starting verification service"
    );

    let detector = match Detector::<OrtBackend>::load(&config.inference) {
        Ok(detector) => detector,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), model_path = %config.inference.model_path, "Failed to load model");
            return Err(e);
        }
    };
    tracing::info!(
        num_classes = ?detector.model_info().num_classes,
        "Model loaded"
    );

    let state = AppState::new(
        Some(Arc::new(detector)),
        config.inference.confidence_threshold,
    );
    let app = routes::router(state, config.max_upload_bytes);

    server::run(app, config.bind_addr).await
}
