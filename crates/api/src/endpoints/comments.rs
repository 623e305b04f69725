//! Comment endpoints under `/posts/{id}/comments`.
//!
//! These skip post loading and resolve the post id themselves.

use axum::extract::State;
use gophersocial_common::AppResult;
use gophersocial_core::CreateCommentInput;
use gophersocial_db::entities::comment;
use gophersocial_db::repositories::CommentWithAuthor;

use crate::{
    extractors::{ApiJson, AuthUser, PathId},
    middleware::AppState,
    response::ApiResponse,
};

pub async fn list(
    State(state): State<AppState>,
    PathId(post_id): PathId,
) -> AppResult<ApiResponse<Vec<CommentWithAuthor>>> {
    let comments = state.comment_service.list(post_id).await?;
    Ok(ApiResponse::ok(comments))
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    PathId(post_id): PathId,
    ApiJson(input): ApiJson<CreateCommentInput>,
) -> AppResult<ApiResponse<comment::Model>> {
    let created = state
        .comment_service
        .create(user.id(), post_id, input)
        .await?;
    Ok(ApiResponse::created(created))
}
