//! Operator diagnostics, guarded by basic auth.

use axum::extract::State;
use serde::Serialize;

use crate::{middleware::AppState, response::ApiResponse};

/// Runtime variables.
#[derive(Debug, Serialize)]
pub struct DebugVars {
    pub version: &'static str,
    pub env: String,
    pub rate_limiter_enabled: bool,
    pub rate_limiter_keys: usize,
}

pub async fn vars(State(state): State<AppState>) -> ApiResponse<DebugVars> {
    ApiResponse::ok(DebugVars {
        version: env!("CARGO_PKG_VERSION"),
        env: state.config.server.env.clone(),
        rate_limiter_enabled: state.rate_limiter.is_enabled(),
        rate_limiter_keys: state.rate_limiter.key_count().await,
    })
}
