//! Registration and token endpoints.

use axum::{Router, extract::State, routing::post};
use gophersocial_common::AppResult;
use gophersocial_core::RegisterUserInput;
use gophersocial_db::entities::user;
use serde::Deserialize;
use validator::Validate;

use crate::{extractors::ApiJson, middleware::AppState, response::ApiResponse};

/// Token request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTokenRequest {
    #[validate(length(min = 1, max = 255))]
    pub username: String,

    #[validate(length(min = 1, max = 72))]
    pub password: String,
}

/// Register an inactive account and mail its activation link.
async fn register(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<RegisterUserInput>,
) -> AppResult<ApiResponse<user::Model>> {
    let user = state.registration_service.register(input).await?;
    Ok(ApiResponse::created(user))
}

/// Exchange credentials for a bearer token.
async fn create_token(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateTokenRequest>,
) -> AppResult<ApiResponse<String>> {
    req.validate()?;

    let user = state
        .user_service
        .authenticate(&req.username, &req.password)
        .await?;
    let token = state.authenticator.generate_token(user.id())?;

    Ok(ApiResponse::created(token))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user", post(register))
        .route("/token", post(create_token))
}
