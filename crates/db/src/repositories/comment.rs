//! Comment repository.

use std::sync::Arc;

use crate::entities::{Comment, User, comment, user};
use crate::query::{classify_write_error, db_error, timed};
use gophersocial_common::AppResult;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};

/// Values for a comment insert.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
}

/// Public view of a comment's author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentAuthor {
    pub id: i64,
    pub username: String,
}

/// A comment with its author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: comment::Model,
    pub user: Option<CommentAuthor>,
}

impl From<(comment::Model, Option<user::Model>)> for CommentWithAuthor {
    fn from((comment, author): (comment::Model, Option<user::Model>)) -> Self {
        Self {
            comment,
            user: author.map(|u| CommentAuthor {
                id: u.id,
                username: u.username,
            }),
        }
    }
}

/// Comment repository for database operations.
#[derive(Clone)]
pub struct CommentRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Append a comment. A missing post or user is `NotFound`.
    pub async fn create(&self, new_comment: NewComment) -> AppResult<comment::Model> {
        let model = comment::ActiveModel {
            post_id: Set(new_comment.post_id),
            user_id: Set(new_comment.user_id),
            content: Set(new_comment.content),
            ..Default::default()
        };

        timed(model.insert(self.db.as_ref()))
            .await
            .map_err(classify_write_error)
    }

    /// Comments on a post in creation order.
    pub async fn get_by_post_id(&self, post_id: i64) -> AppResult<Vec<CommentWithAuthor>> {
        let rows = timed(
            Comment::find()
                .filter(comment::Column::PostId.eq(post_id))
                .find_also_related(User)
                .order_by_asc(comment::Column::CreatedAt)
                .order_by_asc(comment::Column::Id)
                .all(self.db.as_ref()),
        )
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(CommentWithAuthor::from).collect())
    }
}
