//! Read-through user cache.
//!
//! Entries are the JSON form of [`UserWithRole`] (which never carries the
//! password hash), keyed by `user-{id}`. Entries expire after
//! [`USER_CACHE_TTL`]; nothing invalidates them earlier, so a role change can
//! take up to one TTL to be observed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fred::clients::Client as RedisClient;
use fred::interfaces::KeysInterface;
use fred::types::Expiration;
use gophersocial_common::{AppError, AppResult};
use gophersocial_db::repositories::UserWithRole;
use tracing::debug;

/// Lifetime of a cached user.
pub const USER_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Cache key for a user id.
#[must_use]
pub fn cache_key(user_id: i64) -> String {
    format!("user-{user_id}")
}

/// Storage for cached users.
#[async_trait]
pub trait UserCache: Send + Sync {
    /// Fetch a cached user. `Ok(None)` is a miss.
    async fn get(&self, user_id: i64) -> AppResult<Option<UserWithRole>>;

    /// Store a user for [`USER_CACHE_TTL`].
    async fn set(&self, user: &UserWithRole) -> AppResult<()>;
}

/// Redis-backed [`UserCache`].
#[derive(Clone)]
pub struct RedisUserCache {
    redis: Arc<RedisClient>,
    ttl_secs: i64,
}

impl RedisUserCache {
    #[must_use]
    pub const fn new(redis: Arc<RedisClient>) -> Self {
        Self {
            redis,
            ttl_secs: USER_CACHE_TTL.as_secs() as i64,
        }
    }
}

#[async_trait]
impl UserCache for RedisUserCache {
    async fn get(&self, user_id: i64) -> AppResult<Option<UserWithRole>> {
        let cached: Option<String> = self
            .redis
            .get(cache_key(user_id))
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        match cached {
            Some(json) => {
                let user = serde_json::from_str(&json)
                    .map_err(|e| AppError::Internal(format!("corrupt cached user: {e}")))?;
                debug!(user_id, "Cache hit for user");
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, user: &UserWithRole) -> AppResult<()> {
        let json = serde_json::to_string(user)
            .map_err(|e| AppError::Internal(format!("failed to encode user: {e}")))?;

        self.redis
            .set::<(), _, _>(
                cache_key(user.id()),
                json,
                Some(Expiration::EX(self.ttl_secs)),
                None,
                false,
            )
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key(42), "user-42");
    }

    #[test]
    fn test_ttl_is_one_hour() {
        assert_eq!(USER_CACHE_TTL.as_secs(), 3600);
    }
}
