//! HTTP inference boundary
//!
//! One detection endpoint plus health and an administrative model reload:
//!
//! ```text
//! POST /api/detect-image   {"image": "<base64>"} → {"isAI", "confidence", "artifacts"}
//! GET  /health
//! POST /admin/reload-model
//! ```
//!
//! The core's error kinds are flattened to a single `{"error": ...}` string
//! at this boundary; user-input failures map to 400, everything else to 500.

mod handlers;
mod state;

pub use handlers::{detect_image, health_check, reload_model};
pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};

use crate::infer::Detector;

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Bind error: {0}")]
    Bind(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server address
    pub address: SocketAddr,
    /// Enable CORS
    pub cors_enabled: bool,
    /// Maximum request body size in bytes (base64 images are bulky)
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:5001".parse().expect("static address parses"),
            cors_enabled: true,
            max_body_size: 16 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Create config with custom address
    pub fn with_address(mut self, addr: SocketAddr) -> Self {
        self.address = addr;
        self
    }

    /// Disable CORS
    pub fn without_cors(mut self) -> Self {
        self.cors_enabled = false;
        self
    }
}

/// Detection request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectRequest {
    /// Base64-encoded image
    pub image: Option<String>,
}

/// Detection response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    /// Classification at the configured threshold
    #[serde(rename = "isAI")]
    pub is_ai: bool,
    /// Squashed critic score in [0, 1]
    pub confidence: f32,
    /// Fixed artifact tags for positive detections
    pub artifacts: Vec<String>,
}

/// Flattened error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Single human-readable message
    pub error: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Server status
    pub status: String,
    /// Crate version
    pub version: String,
    /// Uptime in seconds
    pub uptime_secs: u64,
    /// Checkpoint backing the detector
    pub checkpoint: String,
    /// Decision threshold
    pub threshold: f32,
}

/// Build the application router over a loaded detector
pub fn router(detector: Detector, config: &ServerConfig) -> Router {
    let state = AppState::new(detector);
    let mut app = Router::new()
        .route("/api/detect-image", post(detect_image))
        .route("/health", get(health_check))
        .route("/admin/reload-model", post(reload_model))
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .with_state(state);
    if config.cors_enabled {
        app = app
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));
    }
    app
}

/// Serve until ctrl-c
pub async fn run(detector: Detector, config: ServerConfig) -> Result<(), ServerError> {
    let app = router(detector, &config);
    let listener = tokio::net::TcpListener::bind(config.address)
        .await
        .map_err(|e| ServerError::Bind(format!("{}: {e}", config.address)))?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("install ctrl-c handler");
}
