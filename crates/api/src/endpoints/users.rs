//! User endpoints.

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, put},
};
use gophersocial_common::AppResult;
use gophersocial_core::PaginatedFeedQuery;
use gophersocial_db::repositories::{PostWithMetadata, UserWithRole};

use crate::{
    extractors::{ApiQuery, AuthUser, PathId},
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Redeem an activation token. Public.
pub async fn activate(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.registration_service.activate(&token).await?;
    Ok(no_content())
}

/// Fetch an active user.
async fn show(
    State(state): State<AppState>,
    PathId(user_id): PathId,
) -> AppResult<ApiResponse<UserWithRole>> {
    let user = state.user_service.get(user_id).await?;
    Ok(ApiResponse::ok(user))
}

/// Follow `{id}` as the authenticated user.
async fn follow(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathId(followee_id): PathId,
) -> AppResult<impl IntoResponse> {
    state
        .following_service
        .follow(user.id(), followee_id)
        .await?;
    Ok(no_content())
}

/// Stop following `{id}`.
async fn unfollow(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathId(followee_id): PathId,
) -> AppResult<impl IntoResponse> {
    state
        .following_service
        .unfollow(user.id(), followee_id)
        .await?;
    Ok(no_content())
}

/// Posts by the caller and by everyone they follow.
async fn feed(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<PaginatedFeedQuery>,
) -> AppResult<ApiResponse<Vec<PostWithMetadata>>> {
    let posts = state.post_service.feed(user.id(), query).await?;
    Ok(ApiResponse::ok(posts))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/feed", get(feed))
        .route("/{id}", get(show))
        .route("/{id}/follow", put(follow))
        .route("/{id}/unfollow", put(unfollow))
}
