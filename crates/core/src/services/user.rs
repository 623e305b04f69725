//! User service: lookups, credential checks and the read-through cache.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use gophersocial_common::{AppError, AppResult};
use gophersocial_db::repositories::{UserRepository, UserWithRole};
use tracing::{debug, info};

use super::cache::UserCache;

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    users: UserRepository,
    cache: Option<Arc<dyn UserCache>>,
}

impl UserService {
    /// Create a new user service. `cache` is `None` when caching is disabled.
    #[must_use]
    pub fn new(users: UserRepository, cache: Option<Arc<dyn UserCache>>) -> Self {
        Self { users, cache }
    }

    /// Load an active user, consulting the cache first.
    ///
    /// On a miss the store result is written back. A failed write is an error.
    pub async fn get(&self, user_id: i64) -> AppResult<UserWithRole> {
        let Some(cache) = &self.cache else {
            return self.users.get_by_id(user_id).await;
        };

        if let Some(user) = cache.get(user_id).await? {
            return Ok(user);
        }

        info!(user_id, "Cache miss, fetching user from store");
        let user = self.users.get_by_id(user_id).await?;
        cache.set(&user).await?;
        Ok(user)
    }

    /// Check credentials for an active user.
    ///
    /// Unknown usernames and wrong passwords are indistinguishable.
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<UserWithRole> {
        let user = match self.users.get_by_username(username).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => {
                debug!(username, "Authentication for unknown or inactive user");
                return Err(invalid_credentials());
            }
            Err(e) => return Err(e),
        };

        if !verify_password(password, &user.user.password)? {
            return Err(invalid_credentials());
        }

        Ok(user)
    }
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("invalid credentials".to_string())
}

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash in constant time.
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
