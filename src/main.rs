//! Ledger Engine - Main Application Entry Point
//!
//! REST API server for personal-finance ledgers: accounts, incomes,
//! expenses and transfers, with account balances reconciled on every write.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx, or an in-memory store when no
//!   `DATABASE_URL` is configured
//! - **Authentication**: API key with SHA-256 hashing, throttled per client
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Pick the store: connect and migrate PostgreSQL, or fall back to memory
//! 3. Build HTTP router with routes and middleware
//! 4. Start server on configured port

use std::net::SocketAddr;

use ledger_engine::{
    config::Config,
    db,
    middleware::rate_limit::RateLimiter,
    routes,
    state::AppState,
    store::{LedgerStore, memory::MemoryStore, postgres::PgStore},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    let limiter = RateLimiter::new(config.auth_max_failures, config.auth_window());

    match config.database_url.as_deref() {
        Some(url) => {
            let pool = db::create_pool(url, config.db_max_connections).await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");

            serve(&config, AppState::new(PgStore::new(pool), limiter)).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on exit");
            serve(&config, AppState::new(MemoryStore::new(), limiter)).await
        }
    }
}

async fn serve<S: LedgerStore>(config: &Config, state: AppState<S>) -> anyhow::Result<()> {
    let app = routes::build_router(state, routes::cors_layer(&config.origins()));

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Connect info feeds the per-client authentication throttle
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
