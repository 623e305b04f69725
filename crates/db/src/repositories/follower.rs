//! Follower repository: directed follow edges.

use std::sync::Arc;

use crate::entities::{Follower, follower};
use crate::query::{classify_write_error, db_error, timed};
use gophersocial_common::{AppError, AppResult};
use sea_orm::{ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Follower repository for database operations.
#[derive(Clone)]
pub struct FollowerRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowerRepository {
    /// Create a new follower repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Record that `follower_id` follows `user_id`.
    ///
    /// An existing edge is a `Conflict`, an unknown user is `NotFound`.
    pub async fn follow(&self, follower_id: i64, user_id: i64) -> AppResult<()> {
        let edge = follower::ActiveModel {
            user_id: Set(user_id),
            follower_id: Set(follower_id),
            ..Default::default()
        };

        timed(Follower::insert(edge).exec_without_returning(self.db.as_ref()))
            .await
            .map_err(classify_write_error)?;
        Ok(())
    }

    /// Remove the edge. A missing edge is `NotFound`.
    pub async fn unfollow(&self, follower_id: i64, user_id: i64) -> AppResult<()> {
        let result = timed(
            Follower::delete_many()
                .filter(follower::Column::UserId.eq(user_id))
                .filter(follower::Column::FollowerId.eq(follower_id))
                .exec(self.db.as_ref()),
        )
        .await
        .map_err(db_error)?;

        if result.rows_affected == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_follow() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let repo = FollowerRepository::new(Arc::new(db));

        assert!(repo.follow(1, 2).await.is_ok());
    }

    #[tokio::test]
    async fn test_unfollow() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let repo = FollowerRepository::new(Arc::new(db));

        assert!(repo.unfollow(1, 2).await.is_ok());
    }

    #[tokio::test]
    async fn test_unfollow_without_edge_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let repo = FollowerRepository::new(Arc::new(db));

        assert!(matches!(
            repo.unfollow(1, 2).await,
            Err(AppError::NotFound(_))
        ));
    }
}
