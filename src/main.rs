//! limitd - Tier-based rate limiter service
//!
//! Serves a small HTTP API that decides, per request, whether a user is
//! within their request budget for the current time bucket. Budgets come
//! from the user's subscription tier or a per-user override stored in
//! PostgreSQL; counters live in Redis so every instance sees one source
//! of truth.

mod cache;
mod cli;
mod clock;
mod config;
mod db;
mod defaults;
mod error;
mod handlers;
mod services;
mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::cache::RedisCounterStore;
use crate::clock::SystemClock;
use crate::services::limits::TierPolicies;
use crate::services::rate_limiter::RateLimiter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    dotenvy::dotenv().ok();

    let config = config::Config::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;

    match cli.command {
        Some(cli::Command::Migrate) => {
            db::run_migrations(&pool).await?;
            info!("Migrations complete, exiting.");
            Ok(())
        }
        Some(cli::Command::Serve) | None => run_server(config, pool).await,
    }
}

async fn run_server(config: config::Config, pool: sqlx::PgPool) -> Result<()> {
    let logs_dir = std::env::var("LOGS_DIR")
        .unwrap_or_else(|_| "./logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    let file_appender = RollingFileAppender::new(
        Rotation::DAILY,
        &logs_dir,
        "limitd.log",
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,limitd=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    info!("Starting limitd...");

    db::run_migrations(&pool).await?;
    info!("Connected to PostgreSQL");

    let store = RedisCounterStore::connect(&config.redis)
        .await
        .context("failed to connect to counter store")?;
    info!("Connected to Redis at {}:{}", config.redis.host, config.redis.port);

    let limiter = Arc::new(RateLimiter::new(
        Arc::new(store),
        Arc::new(TierPolicies::standard()),
        Arc::new(SystemClock),
    ));

    let state = handlers::AppState { pool, limiter };
    let app = handlers::router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // In-flight requests have drained by this point; counter-store teardown
    // failures are logged by the connection manager, never surfaced.
    info!("Shutdown complete");
    Ok(())
}

/// Resolves when the process receives SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining...");
}
