//! Role precedence checks.

use gophersocial_common::{AppError, AppResult};
use gophersocial_db::repositories::{RoleRepository, UserWithRole};
use tracing::warn;

/// Role service.
#[derive(Clone)]
pub struct RoleService {
    roles: RoleRepository,
}

impl RoleService {
    #[must_use]
    pub const fn new(roles: RoleRepository) -> Self {
        Self { roles }
    }

    /// Whether `user` holds `required` or a stronger role.
    pub async fn has_precedence(&self, user: &UserWithRole, required: &str) -> AppResult<bool> {
        let Some(role) = self.roles.find_by_name(required).await? else {
            warn!(role = required, "Precedence check against unknown role");
            return Ok(false);
        };

        Ok(user.role.level >= role.level)
    }

    /// Allow the owner of a resource, or anyone at `required` level or above.
    pub async fn authorize(
        &self,
        user: &UserWithRole,
        owner_id: i64,
        required: &str,
    ) -> AppResult<()> {
        if user.id() == owner_id || self.has_precedence(user, required).await? {
            Ok(())
        } else {
            Err(AppError::Forbidden("forbidden".to_string()))
        }
    }
}
