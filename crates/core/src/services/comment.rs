//! Comment service.

use gophersocial_common::{AppError, AppResult};
use gophersocial_db::entities::comment;
use gophersocial_db::repositories::{
    CommentRepository, CommentWithAuthor, NewComment, PostRepository,
};
use serde::Deserialize;
use validator::Validate;

/// Input for commenting on a post.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCommentInput {
    /// Optional author id. When present it must be the caller's own id.
    pub user_id: Option<i64>,

    #[validate(length(min = 1, max = 1000))]
    pub content: String,
}

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    comments: CommentRepository,
    posts: PostRepository,
}

impl CommentService {
    #[must_use]
    pub const fn new(comments: CommentRepository, posts: PostRepository) -> Self {
        Self { comments, posts }
    }

    /// Comment on `post_id` as `author_id`.
    pub async fn create(
        &self,
        author_id: i64,
        post_id: i64,
        input: CreateCommentInput,
    ) -> AppResult<comment::Model> {
        input.validate()?;

        if input.user_id.is_some_and(|id| id != author_id) {
            return Err(AppError::Forbidden(
                "cannot comment on behalf of another user".to_string(),
            ));
        }
        self.ensure_post_exists(post_id).await?;

        self.comments
            .create(NewComment {
                post_id,
                user_id: author_id,
                content: input.content,
            })
            .await
    }

    /// Comments on a post, oldest first. A missing post is `NotFound`.
    pub async fn list(&self, post_id: i64) -> AppResult<Vec<CommentWithAuthor>> {
        self.ensure_post_exists(post_id).await?;
        self.comments.get_by_post_id(post_id).await
    }

    async fn ensure_post_exists(&self, post_id: i64) -> AppResult<()> {
        match self.posts.find_by_id(post_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound("post not found".to_string())),
        }
    }
}
