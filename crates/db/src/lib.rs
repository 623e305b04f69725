//! Database layer for GopherSocial.

pub mod entities;
pub mod migrations;
pub mod query;
pub mod repositories;
pub mod test_utils;

use gophersocial_common::{AppError, Config};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::log::LevelFilter;

pub use query::QUERY_TIMEOUT;
pub use repositories::Storage;

/// Initialize database connection.
///
/// `max_idle_conns` becomes the pool floor, bounded by `max_open_conns`.
pub async fn init(config: &Config) -> Result<DatabaseConnection, AppError> {
    let mut opt = ConnectOptions::new(&config.database.url);

    opt.max_connections(config.database.max_open_conns)
        .min_connections(
            config
                .database
                .max_idle_conns
                .min(config.database.max_open_conns),
        )
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(QUERY_TIMEOUT)
        .idle_timeout(config.database.max_idle_time())
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    Database::connect(opt)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Run pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    use sea_orm_migration::MigratorTrait;
    migrations::Migrator::up(db, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
