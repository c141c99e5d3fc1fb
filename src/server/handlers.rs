//! HTTP request handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::state::AppState;
use super::{DetectRequest, DetectResponse, ErrorResponse, HealthResponse};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: message.into() }))
}

/// Classify a base64-encoded image
pub async fn detect_image(
    State(state): State<AppState>,
    Json(payload): Json<DetectRequest>,
) -> Result<Json<DetectResponse>, ApiError> {
    let image = match payload.image {
        Some(image) if !image.is_empty() => image,
        _ => return Err(error_response(StatusCode::BAD_REQUEST, "No image provided")),
    };

    let detector = state.detector().await;
    // The forward pass is CPU-bound; keep it off the async workers
    let prediction = tokio::task::spawn_blocking(move || detector.predict_base64(&image))
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| {
            let status = if e.is_user_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            error_response(status, e.to_string())
        })?;

    Ok(Json(DetectResponse {
        is_ai: prediction.is_ai,
        confidence: prediction.confidence,
        artifacts: prediction.artifacts,
    }))
}

/// Health check
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let detector = state.detector().await;
    let health = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        checkpoint: detector.checkpoint_path().display().to_string(),
        threshold: detector.threshold(),
    };
    (StatusCode::OK, Json(health))
}

/// Administrative reload: re-read the checkpoint from disk and swap it in
pub async fn reload_model(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let current = state.detector().await;
    let reloaded = tokio::task::spawn_blocking(move || current.reload())
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    state.replace_detector(reloaded).await;
    Ok(Json(serde_json::json!({ "status": "reloaded" })))
}
