//! Following service.

use gophersocial_common::AppResult;
use gophersocial_db::repositories::FollowerRepository;
use tracing::info;

/// Following service for business logic.
#[derive(Clone)]
pub struct FollowingService {
    followers: FollowerRepository,
}

impl FollowingService {
    #[must_use]
    pub const fn new(followers: FollowerRepository) -> Self {
        Self { followers }
    }

    /// `follower_id` starts following `followee_id`.
    ///
    /// Following twice is a `Conflict`; an unknown followee is `NotFound`.
    pub async fn follow(&self, follower_id: i64, followee_id: i64) -> AppResult<()> {
        self.followers.follow(follower_id, followee_id).await?;
        info!(follower_id, followee_id, "User followed");
        Ok(())
    }

    /// `follower_id` stops following `followee_id`.
    pub async fn unfollow(&self, follower_id: i64, followee_id: i64) -> AppResult<()> {
        self.followers.unfollow(follower_id, followee_id).await?;
        info!(follower_id, followee_id, "User unfollowed");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gophersocial_common::AppError;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn service(rows_affected: u64) -> FollowingService {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected,
            }])
            .into_connection();
        FollowingService::new(FollowerRepository::new(Arc::new(db)))
    }

    #[tokio::test]
    async fn test_follow() {
        assert!(service(1).follow(1, 2).await.is_ok());
    }

    #[tokio::test]
    async fn test_unfollow_without_edge() {
        assert!(matches!(
            service(0).unfollow(1, 2).await,
            Err(AppError::NotFound(_))
        ));
    }
}
