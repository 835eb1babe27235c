//! SuvFin Server - Main Entry Point
//!
//! WhatsApp Cloud API webhook gateway.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fred::interfaces::ClientLike;
use tracing::{info, warn};

use suvfin_server::{
    api, config, db, observability,
    ratelimit::{RateLimitConfig, RateLimiter},
    replies::SilentReplies,
    whatsapp::GraphApiClient,
};

/// How long shutdown waits for in-flight webhook processing.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    // Error reporting first so start-up failures are captured
    let sentry_guard = observability::init_error_reporting(&config);
    observability::init_tracing(sentry_guard.is_some());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        env = config.app_env.as_str(),
        "Starting SuvFin webhook gateway"
    );

    if config.facebook_app_secret.is_none() {
        warn!("FACEBOOK_APP_SECRET not set, webhook signatures will not be verified");
    }

    // Initialize database
    let db_pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db::run_migrations(&db_pool)
        .await
        .context("Failed to run migrations")?;

    // Initialize Redis
    let redis = db::create_redis_client(&config.redis_url)
        .await
        .context("Failed to connect to Redis")?;

    // Initialize rate limiter (optional)
    let rate_limiter = {
        let rl_config = RateLimitConfig::from_env();
        if rl_config.enabled {
            let mut limiter = RateLimiter::new(redis.clone(), rl_config);
            match limiter.init().await {
                Ok(()) => {
                    info!("Rate limiter initialized");
                    Some(limiter)
                }
                Err(e) => {
                    warn!("Rate limiter initialization failed: {}. Rate limiting disabled.", e);
                    None
                }
            }
        } else {
            info!("Rate limiting disabled by configuration");
            None
        }
    };

    // Outbound Graph API client
    let whatsapp = GraphApiClient::from_config(&config).context("Failed to build HTTP client")?;
    if !config.has_whatsapp_credentials() {
        warn!("WhatsApp credentials missing, replies and read receipts will fail");
    }

    // Build application state
    let state = api::AppState::new(api::AppStateConfig {
        db: db_pool,
        redis: redis.clone(),
        config: config.clone(),
        whatsapp,
        replies: Arc::new(SilentReplies),
        rate_limiter,
    });

    // Build router
    let tasks = state.tasks.clone();
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!(address = %config.bind_address, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tasks.close();
    info!(pending = tasks.len(), "Waiting for webhook processing to finish");
    if tokio::time::timeout(DRAIN_TIMEOUT, tasks.wait()).await.is_err() {
        warn!(
            pending = tasks.len(),
            timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "Webhook processing still running at shutdown"
        );
    }

    if let Err(e) = redis.quit().await {
        warn!(error = %e, "Redis quit failed");
    }

    info!("Server shutdown complete");
    drop(sentry_guard);

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Received shutdown signal, cleaning up...");
}
