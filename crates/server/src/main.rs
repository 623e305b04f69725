//! GopherSocial server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fred::interfaces::ClientLike;
use gophersocial_api::{AppState, FixedWindowLimiter};
use gophersocial_common::Config;
use gophersocial_core::{Mailer, RedisUserCache, SendGridTransport, UserCache};
use gophersocial_db::Storage;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often idle rate limiter windows are dropped.
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Connect the user cache, or `None` when caching is disabled.
async fn connect_cache(
    config: &Config,
) -> Result<Option<Arc<dyn UserCache>>, Box<dyn std::error::Error>> {
    if !config.redis.enabled {
        info!("Redis cache disabled");
        return Ok(None);
    }

    let redis_config = fred::types::config::Config::from_url(&config.redis.url())?;
    let client = fred::clients::Client::new(redis_config, None, None, None);
    client.init().await?;
    info!(addr = %config.redis.addr, "Connected to Redis cache");

    Ok(Some(Arc::new(RedisUserCache::new(Arc::new(client)))))
}

fn spawn_limiter_cleanup(limiter: FixedWindowLimiter) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            limiter.cleanup().await;
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gophersocial=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::load()?;
    info!(env = %config.server.env, "Starting GopherSocial server...");

    let db = gophersocial_db::init(&config).await?;
    info!("Database connection pool established");

    info!("Running database migrations...");
    gophersocial_db::migrate(&db).await?;
    info!("Migrations completed");

    let cache = connect_cache(&config).await?;

    if config.mail.sendgrid_api_key.is_empty() {
        warn!("SendGrid API key is empty; invitation mail will fail");
    }
    let transport =
        SendGridTransport::new(&config.mail.sendgrid_api_key, &config.mail.from_email);
    let mailer = Mailer::new(Arc::new(transport));

    let addr: SocketAddr = config.server.addr.parse()?;
    let state = AppState::new(config, Storage::new(Arc::new(db)), cache, mailer);

    if state.rate_limiter.is_enabled() {
        spawn_limiter_cleanup(state.rate_limiter.clone());
    }

    let app = gophersocial_api::app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has stopped");
    Ok(())
}
