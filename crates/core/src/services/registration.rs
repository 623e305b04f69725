//! Account registration and activation.
//!
//! Registration creates an inactive user with an invitation in one
//! transaction, then mails the activation link. The mail step is outside the
//! transaction, so a terminal send failure is compensated by deleting the user.

use std::time::Duration;

use gophersocial_common::{AppError, AppResult, generate_invitation_token, hash_token};
use gophersocial_db::entities::user;
use gophersocial_db::repositories::{NewUser, UserRepository};
use serde::Deserialize;
use tracing::{error, info};
use validator::Validate;

use super::mailer::Mailer;
use super::user::hash_password;

/// Input for registering a new account.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterUserInput {
    #[validate(length(min = 1, max = 100))]
    pub username: String,

    #[validate(email, length(max = 255))]
    pub email: String,

    #[validate(length(min = 8, max = 72))]
    pub password: String,
}

/// Registration service.
#[derive(Clone)]
pub struct RegistrationService {
    users: UserRepository,
    mailer: Mailer,
    frontend_url: String,
    invitation_ttl: Duration,
    sandbox: bool,
}

impl RegistrationService {
    /// `sandbox` is forwarded to the mail provider on every send.
    #[must_use]
    pub fn new(
        users: UserRepository,
        mailer: Mailer,
        frontend_url: &str,
        invitation_ttl: Duration,
        sandbox: bool,
    ) -> Self {
        Self {
            users,
            mailer,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            invitation_ttl,
            sandbox,
        }
    }

    /// Register an inactive account and send its activation mail.
    ///
    /// Duplicate usernames and emails are `BadRequest` naming the taken field.
    /// A mail failure removes the account again and is reported as `Internal`.
    pub async fn register(&self, input: RegisterUserInput) -> AppResult<user::Model> {
        input.validate()?;

        let plain_token = generate_invitation_token();
        let new_user = NewUser {
            username: input.username,
            email: input.email,
            password_hash: hash_password(&input.password)?,
        };

        let created = self
            .users
            .create_and_invite(new_user, &hash_token(&plain_token), self.invitation_ttl)
            .await
            .map_err(duplicate_as_bad_request)?;

        let activation_url = self.activation_url(&plain_token);
        match self
            .mailer
            .send_invitation(&created.username, &created.email, &activation_url, self.sandbox)
            .await
        {
            Ok(status) => {
                info!(user_id = created.id, status, "Activation mail sent");
                Ok(created)
            }
            Err(e) => {
                error!(user_id = created.id, error = %e, "Error sending welcome email");
                if let Err(delete_err) = self.users.delete(created.id).await {
                    error!(user_id = created.id, error = %delete_err, "Error deleting user");
                }
                Err(AppError::Internal(format!("failed to send activation email: {e}")))
            }
        }
    }

    /// Redeem an activation token. Unknown, expired and used tokens are `BadRequest`.
    pub async fn activate(&self, plain_token: &str) -> AppResult<i64> {
        match self.users.activate(plain_token).await {
            Ok(user_id) => {
                info!(user_id, "User activated");
                Ok(user_id)
            }
            Err(AppError::NotFound(_)) => Err(AppError::BadRequest(
                "invalid or expired invitation token".to_string(),
            )),
            Err(e) => Err(e),
        }
    }

    fn activation_url(&self, plain_token: &str) -> String {
        format!("{}/users/activate/{plain_token}", self.frontend_url)
    }
}

/// Registration reports a taken username or email as a bad request.
fn duplicate_as_bad_request(err: AppError) -> AppError {
    match err {
        AppError::Conflict(message) => AppError::BadRequest(message),
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::services::mailer::tests::RecordingTransport;
    use chrono::Utc;
    use gophersocial_db::entities::role;
    use sea_orm::{
        DatabaseBackend, DatabaseConnection, DbErr, MockDatabase, MockExecResult, RuntimeErr,
        Statement,
    };
    use std::sync::Arc;

    fn user_role() -> role::Model {
        role::Model {
            id: 1,
            name: "user".to_string(),
            level: 1,
            description: String::new(),
        }
    }

    fn inserted_user() -> user::Model {
        user::Model {
            id: 1,
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            password: "hash".to_string(),
            created_at: Utc::now().into(),
            is_active: false,
            role_id: 1,
        }
    }

    fn input() -> RegisterUserInput {
        RegisterUserInput {
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            password: "password1".to_string(),
        }
    }

    fn ok_exec() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    fn service(db: MockDatabase, transport: Arc<RecordingTransport>) -> RegistrationService {
        service_on(Arc::new(db.into_connection()), transport)
    }

    fn service_on(
        conn: Arc<DatabaseConnection>,
        transport: Arc<RecordingTransport>,
    ) -> RegistrationService {
        RegistrationService::new(
            UserRepository::new(conn),
            Mailer::new(transport).with_backoff_step(Duration::ZERO),
            "http://localhost:5173/",
            Duration::from_secs(3 * 24 * 60 * 60),
            true,
        )
    }

    #[tokio::test]
    async fn test_register_sends_activation_mail() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_role()]])
            .append_query_results([[inserted_user()]])
            .append_exec_results([ok_exec()]);
        let transport = Arc::new(RecordingTransport::default());

        let created = service(db, transport.clone())
            .register(input())
            .await
            .unwrap();

        assert!(!created.is_active);
        let delivered = transport.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].sandbox);
        assert!(
            delivered[0]
                .body
                .contains("http://localhost:5173/users/activate/")
        );
    }

    /// One transaction removing both the invitations and the user row.
    fn deletes_user(statements: &[Statement]) -> bool {
        let deletes = |table: &str| {
            let prefix = format!(r#"DELETE FROM "{table}""#);
            statements.iter().any(|stmt| stmt.sql.starts_with(&prefix))
        };
        deletes("user_invitations") && deletes("users")
    }

    #[tokio::test]
    async fn test_register_compensates_failed_mail() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_role()]])
            .append_query_results([[inserted_user()]])
            .append_exec_results([ok_exec(), ok_exec(), ok_exec()])
            .into_connection();
        let conn = Arc::new(db);
        let transport = Arc::new(RecordingTransport::failing_always());
        let service = service_on(conn.clone(), transport.clone());

        let result = service.register(input()).await;

        assert!(matches!(result, Err(AppError::Internal(_))));
        assert_eq!(*transport.attempts.lock().unwrap(), 3);

        drop(service);
        let log = Arc::try_unwrap(conn).ok().unwrap().into_transaction_log();
        assert!(log.iter().any(|txn| deletes_user(txn.statements())));
    }

    #[tokio::test]
    async fn test_register_keeps_user_when_mail_succeeds() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_role()]])
            .append_query_results([[inserted_user()]])
            .append_exec_results([ok_exec()])
            .into_connection();
        let conn = Arc::new(db);
        let service = service_on(conn.clone(), Arc::new(RecordingTransport::default()));

        service.register(input()).await.unwrap();

        drop(service);
        let log = Arc::try_unwrap(conn).ok().unwrap().into_transaction_log();
        assert!(!log.iter().any(|txn| deletes_user(txn.statements())));
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_input() {
        let transport = Arc::new(RecordingTransport::default());
        let service = service(MockDatabase::new(DatabaseBackend::Postgres), transport.clone());

        for bad in [
            RegisterUserInput {
                password: "short".to_string(),
                ..input()
            },
            RegisterUserInput {
                email: "not-an-email".to_string(),
                ..input()
            },
            RegisterUserInput {
                username: "x".repeat(101),
                ..input()
            },
            RegisterUserInput {
                password: "p".repeat(73),
                ..input()
            },
        ] {
            assert!(matches!(
                service.register(bad).await,
                Err(AppError::Validation(_))
            ));
        }
        assert!(transport.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_activate_unknown_token_is_bad_request() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()]);
        let service = service(db, Arc::new(RecordingTransport::default()));

        assert!(matches!(
            service.activate("nope").await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_activate_passes_through_store_failure() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_errors([DbErr::Query(
            RuntimeErr::Internal("connection lost".to_string()),
        )]);
        let service = service(db, Arc::new(RecordingTransport::default()));

        assert!(matches!(
            service.activate("t").await,
            Err(AppError::Database(_))
        ));
    }

    #[test]
    fn test_duplicate_is_bad_request() {
        let err = duplicate_as_bad_request(AppError::Conflict(
            "a user with that email already exists".to_string(),
        ));
        match err {
            AppError::BadRequest(message) => assert!(message.contains("email")),
            other => panic!("Expected BadRequest, got {other:?}"),
        }

        assert!(matches!(
            duplicate_as_bad_request(AppError::Database("down".to_string())),
            AppError::Database(_)
        ));
    }

    #[test]
    fn test_activation_url_strips_trailing_slash() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres),
            Arc::new(RecordingTransport::default()),
        );
        assert_eq!(
            service.activation_url("abc"),
            "http://localhost:5173/users/activate/abc"
        );
    }
}
