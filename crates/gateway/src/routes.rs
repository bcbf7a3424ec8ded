use crate::errors::ApiError;
use crate::state::{AppState, Outcome, SystemSnapshot};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    routing::{get, post},
};
use inference::{ModelInfo, VerificationResult, decode_rgb, verify};
use serde::Serialize;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

const SERVICE_NAME: &str = "ai-verification";
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
const FILE_FIELD: &str = "file";

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(health_detailed))
        .route("/ready", get(ready))
        .route("/live", get(live))
        .route("/verify", post(verify_image))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    model_loaded: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: SERVICE_VERSION,
        model_loaded: state.model_loaded(),
    })
}

#[derive(Serialize)]
struct ModelStatus {
    loaded: bool,
    confidence_threshold: f32,
    #[serde(flatten)]
    info: Option<ModelInfo>,
}

#[derive(Serialize)]
struct DetailedHealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    model: ModelStatus,
    system: SystemSnapshot,
}

async fn health_detailed(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    let system = state.system.clone();
    let system = tokio::task::spawn_blocking(move || system.snapshot())
        .await
        .unwrap_or(SystemSnapshot {
            cpu_percent: 0.0,
            memory_percent: 0.0,
            cpu_count: 0,
            cuda_available: false,
            cuda_device_count: 0,
        });

    Json(DetailedHealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: SERVICE_VERSION,
        model: ModelStatus {
            loaded: state.model_loaded(),
            confidence_threshold: state.confidence_threshold,
            info: state.detector.as_ref().map(|d| d.model_info()),
        },
        system,
    })
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    model_loaded: bool,
}

async fn ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, ApiError> {
    if !state.model_loaded() {
        return Err(ApiError::ModelNotLoaded);
    }

    Ok(Json(ReadyResponse {
        status: "ready",
        model_loaded: true,
    }))
}

#[derive(Serialize)]
struct LiveResponse {
    status: &'static str,
    pid: u32,
}

async fn live() -> Json<LiveResponse> {
    Json(LiveResponse {
        status: "alive",
        pid: std::process::id(),
    })
}

async fn verify_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<VerificationResult>, ApiError> {
    let start = Instant::now();

    let result = run_verification(&state, multipart).await;

    let outcome = match &result {
        Ok(r) if r.verified => Outcome::Verified,
        Ok(_) => Outcome::Unverified,
        Err(ApiError::Inference(_)) => Outcome::Failed,
        Err(_) => Outcome::Rejected,
    };
    state.metrics.record(outcome, start.elapsed().as_secs_f64());

    result.map(Json)
}

async fn run_verification(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<VerificationResult, ApiError> {
    let detector = state.detector.clone().ok_or(ApiError::ModelNotLoaded)?;
    let mut multipart = multipart?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            tracing::debug!(content_type = %content_type, "Rejected upload with non-image content type");
            return Err(ApiError::NotAnImage);
        }

        upload = Some((content_type, field.bytes().await?));
        break;
    }
    let (content_type, bytes) = upload.ok_or(ApiError::MissingFile)?;

    let image = decode_rgb(&bytes).map_err(|e| {
        tracing::debug!(error = %e, content_type = %content_type, bytes = bytes.len(), "Rejected undecodable upload");
        ApiError::InvalidImage
    })?;

    let (width, height) = image.dimensions();

    let detections = tokio::task::spawn_blocking(move || detector.detect(&image))
        .await
        .map_err(|e| ApiError::Inference(format!("inference task failed: {}", e)))?
        .map_err(|e| ApiError::Inference(format!("{:#}", e)))?;

    let result = verify(&detections, state.confidence_threshold);

    tracing::info!(
        width,
        height,
        detections = detections.len(),
        verified = result.verified,
        label = result.label.as_deref().unwrap_or("-"),
        confidence = result.confidence,
        "Verification complete"
    );

    Ok(result)
}
