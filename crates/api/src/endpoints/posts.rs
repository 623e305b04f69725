//! Post endpoints.
//!
//! Routes on `/{id}` run behind post loading; edits additionally require
//! ownership or a moderator role, deletes ownership or an admin role.

use axum::{
    Router,
    extract::State,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
};
use gophersocial_common::AppResult;
use gophersocial_core::{CreatePostInput, PostWithComments, UpdatePostInput};
use gophersocial_db::entities::post;
use serde::Serialize;

use crate::{
    endpoints::comments,
    extractors::{ApiJson, AuthUser, CurrentPost},
    middleware::{
        AppState, load_post_middleware, require_admin_or_owner, require_moderator_or_owner,
    },
    response::ApiResponse,
};

/// Deletion acknowledgement.
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: &'static str,
}

async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(input): ApiJson<CreatePostInput>,
) -> AppResult<ApiResponse<post::Model>> {
    let created = state.post_service.create(user.id(), input).await?;
    Ok(ApiResponse::created(created))
}

async fn show(CurrentPost(post): CurrentPost) -> ApiResponse<PostWithComments> {
    ApiResponse::ok(post)
}

/// Partial update guarded by the post version.
async fn update(
    State(state): State<AppState>,
    CurrentPost(current): CurrentPost,
    ApiJson(input): ApiJson<UpdatePostInput>,
) -> AppResult<ApiResponse<post::Model>> {
    let updated = state.post_service.update(&current.post, input).await?;
    Ok(ApiResponse::ok(updated))
}

async fn remove(
    State(state): State<AppState>,
    CurrentPost(current): CurrentPost,
) -> AppResult<ApiResponse<DeletedResponse>> {
    state.post_service.delete(current.post.id).await?;
    Ok(ApiResponse::ok(DeletedResponse {
        message: "post deleted successfully!",
    }))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let post_scoped = Router::new()
        .route(
            "/{id}",
            get(show)
                .merge(patch(update).route_layer(from_fn_with_state(
                    state.clone(),
                    require_moderator_or_owner,
                )))
                .merge(delete(remove).route_layer(from_fn_with_state(
                    state.clone(),
                    require_admin_or_owner,
                ))),
        )
        .route_layer(from_fn_with_state(state.clone(), load_post_middleware));

    Router::new()
        .route("/", post(create))
        .route("/{id}/comments", get(comments::list).post(comments::create))
        .merge(post_scoped)
}
