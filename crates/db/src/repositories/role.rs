//! Role repository.

use std::sync::Arc;

use crate::entities::{Role, role};
use crate::query::{db_error, timed};
use gophersocial_common::AppResult;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Role repository for database operations.
#[derive(Clone)]
pub struct RoleRepository {
    db: Arc<DatabaseConnection>,
}

impl RoleRepository {
    /// Create a new role repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a role by its name.
    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<role::Model>> {
        timed(
            Role::find()
                .filter(role::Column::Name.eq(name))
                .one(self.db.as_ref()),
        )
        .await
        .map_err(db_error)
    }
}
