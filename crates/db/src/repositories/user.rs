//! User repository: accounts, roles and the invitation lifecycle.

use std::sync::Arc;
use std::time::Duration;

use crate::entities::{Role, User, UserInvitation, role, user, user_invitation};
use crate::query::{classify_write_error, db_error, timed};
use chrono::Utc;
use gophersocial_common::{AppError, AppResult, hash_token};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QuerySelect, RelationTrait, TransactionTrait, sea_query::Expr,
};
use serde::{Deserialize, Serialize};

/// A user joined with its role.
///
/// Serializes without the password hash, so it is safe both as an API body
/// and as a cache value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWithRole {
    #[serde(flatten)]
    pub user: user::Model,
    pub role: role::Model,
}

impl UserWithRole {
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.user.id
    }
}

/// Values for a user insert. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Role given to every self-registered account.
pub const DEFAULT_ROLE: &str = "user";

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a user with the named role.
    ///
    /// Duplicate usernames and emails surface as distinct `Conflict`s.
    pub async fn create(&self, new_user: NewUser, role_name: &str) -> AppResult<user::Model> {
        insert_user(self.db.as_ref(), new_user, role_name).await
    }

    /// Insert a user and its invitation in one transaction.
    pub async fn create_and_invite(
        &self,
        new_user: NewUser,
        token_hash: &str,
        ttl: Duration,
    ) -> AppResult<user::Model> {
        let txn = timed(self.db.begin()).await.map_err(db_error)?;

        let created = insert_user(&txn, new_user, DEFAULT_ROLE).await?;

        let expiry = Utc::now()
            + chrono::Duration::from_std(ttl)
                .map_err(|e| AppError::Internal(format!("invalid invitation ttl: {e}")))?;
        let invitation = user_invitation::ActiveModel {
            token: Set(token_hash.to_string()),
            user_id: Set(created.id),
            expiry: Set(expiry.into()),
        };
        timed(UserInvitation::insert(invitation).exec_without_returning(&txn))
            .await
            .map_err(classify_write_error)?;

        timed(txn.commit()).await.map_err(db_error)?;
        Ok(created)
    }

    /// Redeem an invitation token.
    ///
    /// Marks the owner active and deletes all of their invitations in one
    /// transaction. Unknown, expired or already redeemed tokens are `NotFound`.
    pub async fn activate(&self, plain_token: &str) -> AppResult<i64> {
        let token_hash = hash_token(plain_token);
        let txn = timed(self.db.begin()).await.map_err(db_error)?;

        // FOR UPDATE serializes concurrent redemptions of the same token.
        let invited = timed(
            User::find()
                .join(
                    sea_orm::JoinType::InnerJoin,
                    user::Relation::Invitations.def(),
                )
                .filter(user_invitation::Column::Token.eq(token_hash))
                .filter(user_invitation::Column::Expiry.gt(Utc::now()))
                .lock_exclusive()
                .one(&txn),
        )
        .await
        .map_err(db_error)?
        .ok_or_else(AppError::not_found)?;

        timed(
            User::update_many()
                .col_expr(user::Column::IsActive, Expr::value(true))
                .filter(user::Column::Id.eq(invited.id))
                .exec(&txn),
        )
        .await
        .map_err(db_error)?;

        let removed = timed(
            UserInvitation::delete_many()
                .filter(user_invitation::Column::UserId.eq(invited.id))
                .exec(&txn),
        )
        .await
        .map_err(db_error)?;
        if removed.rows_affected == 0 {
            return Err(AppError::not_found());
        }

        timed(txn.commit()).await.map_err(db_error)?;
        Ok(invited.id)
    }

    /// Delete a user and any pending invitations in one transaction.
    pub async fn delete(&self, user_id: i64) -> AppResult<()> {
        let txn = timed(self.db.begin()).await.map_err(db_error)?;

        timed(
            UserInvitation::delete_many()
                .filter(user_invitation::Column::UserId.eq(user_id))
                .exec(&txn),
        )
        .await
        .map_err(db_error)?;

        timed(User::delete_by_id(user_id).exec(&txn))
            .await
            .map_err(db_error)?;

        timed(txn.commit()).await.map_err(db_error)
    }

    /// Fetch an active user with its role.
    pub async fn get_by_id(&self, user_id: i64) -> AppResult<UserWithRole> {
        let row = timed(
            User::find_by_id(user_id)
                .filter(user::Column::IsActive.eq(true))
                .find_also_related(Role)
                .one(self.db.as_ref()),
        )
        .await
        .map_err(db_error)?;

        with_role(row)
    }

    /// Fetch an active user by username, including the password hash.
    pub async fn get_by_username(&self, username: &str) -> AppResult<UserWithRole> {
        let row = timed(
            User::find()
                .filter(user::Column::Username.eq(username))
                .filter(user::Column::IsActive.eq(true))
                .find_also_related(Role)
                .one(self.db.as_ref()),
        )
        .await
        .map_err(db_error)?;

        with_role(row)
    }
}

async fn insert_user<C: ConnectionTrait>(
    conn: &C,
    new_user: NewUser,
    role_name: &str,
) -> AppResult<user::Model> {
    let role = timed(
        Role::find()
            .filter(role::Column::Name.eq(role_name))
            .one(conn),
    )
    .await
    .map_err(db_error)?
    .ok_or_else(|| AppError::Internal(format!("role {role_name} is not seeded")))?;

    let model = user::ActiveModel {
        username: Set(new_user.username),
        email: Set(new_user.email),
        password: Set(new_user.password_hash),
        is_active: Set(false),
        role_id: Set(role.id),
        ..Default::default()
    };

    timed(model.insert(conn)).await.map_err(classify_write_error)
}

fn with_role(row: Option<(user::Model, Option<role::Model>)>) -> AppResult<UserWithRole> {
    match row {
        Some((user, Some(role))) => Ok(UserWithRole { user, role }),
        Some((user, None)) => Err(AppError::Internal(format!(
            "user {} references missing role {}",
            user.id, user.role_id
        ))),
        None => Err(AppError::not_found()),
    }
}
