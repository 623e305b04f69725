//! Health check endpoint.

use axum::extract::State;
use serde::Serialize;

use crate::{middleware::AppState, response::ApiResponse};

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub env: String,
    pub version: &'static str,
}

/// Liveness probe. Touches no backing service.
pub async fn health(State(state): State<AppState>) -> ApiResponse<HealthResponse> {
    ApiResponse::ok(HealthResponse {
        status: "ok",
        env: state.config.server.env.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
