//! Query deadlines and driver error classification.

use std::future::Future;
use std::time::Duration;

use gophersocial_common::AppError;
use sea_orm::{DbErr, SqlErr};

/// Deadline applied to every individual database call.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a database future under [`QUERY_TIMEOUT`].
///
/// Dropping the returned future (request cancelled) drops the query with it,
/// and an uncommitted transaction rolls back when its handle is dropped.
pub async fn timed<T, F>(fut: F) -> Result<T, DbErr>
where
    F: Future<Output = Result<T, DbErr>>,
{
    tokio::time::timeout(QUERY_TIMEOUT, fut)
        .await
        .unwrap_or_else(|_| {
            Err(DbErr::Custom(format!(
                "query timed out after {}s",
                QUERY_TIMEOUT.as_secs()
            )))
        })
}

/// Map a driver error to an opaque server error.
pub fn db_error(err: DbErr) -> AppError {
    AppError::Database(err.to_string())
}

/// Map a write error, surfacing constraint violations as client errors.
pub fn classify_write_error(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) => unique_violation(&message),
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => AppError::not_found(),
        _ => db_error(err),
    }
}

/// Name the conflicting key when the violated constraint is a known one.
pub fn unique_violation(message: &str) -> AppError {
    if message.contains("users_email_key") {
        AppError::Conflict("a user with that email already exists".to_string())
    } else if message.contains("users_username_key") {
        AppError::Conflict("a user with that username already exists".to_string())
    } else {
        AppError::Conflict("resource already exists".to_string())
    }
}
