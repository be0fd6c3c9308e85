use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::{header, Method};
use clap::Parser;
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

use movies_api::config::{Config, StorageKind};
use movies_api::observability::Observability;
use movies_api::rate_limit::RateLimitState;
use movies_api::state::AppState;
use movies_api::store::{MemoryMovieStore, MovieStore, PgMovieStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    let config = Config::parse();
    config.validate()?;

    let obs = Observability::init(config.log_format)?;

    let movies: Arc<dyn MovieStore> = match config.storage {
        StorageKind::Postgres => {
            let dsn = config
                .db_dsn
                .as_deref()
                .context("DATABASE_URL must be set")?;

            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_open_conns)
                .idle_timeout(Duration::from_secs(config.db_max_idle_time_secs))
                .acquire_timeout(config.query_timeout())
                .connect(dsn)
                .await
                .context("failed to connect to the database")?;

            sqlx::migrate!("../../database/migrations")
                .run(&pool)
                .await?;

            tracing::info!(
                max_connections = config.db_max_open_conns,
                "database connection pool established, migrations applied"
            );
            Arc::new(PgMovieStore::new(pool, config.query_timeout()))
        }
        StorageKind::Memory => {
            tracing::warn!("using the in-memory movie store, data is lost on exit");
            Arc::new(MemoryMovieStore::new())
        }
    };

    let state = AppState::new(movies, config.environment, obs.registry);
    let background = state.background.clone();
    let rate_limiter = RateLimitState::from_config(&config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if rate_limiter.enabled() {
        rate_limiter.spawn_sweeper(&background, shutdown_rx);
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = movies_api::app(state, rate_limiter).layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, env = %config.environment, "starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!(
        in_flight = background.in_flight(),
        "shutting down, completing background tasks"
    );
    let _ = shutdown_tx.send(true);
    background.wait().await;

    tracing::info!(%addr, "stopped server");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!(signal = "SIGINT", "shutdown signal received"),
        _ = terminate => tracing::info!(signal = "SIGTERM", "shutdown signal received"),
    }
}
