// Main entry point for the check-in API server

use std::sync::Arc;

use anyhow::{Context, Result};
use checkin::{CheckInService, PostgresStore, TokenService};
use server_core::server::{auth::JwtService, build_app, AppState};
use server_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,checkin=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting check-in API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    let signing_secret = config.signing_secret()?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Schema migrations run inside the store constructor
    let store = PostgresStore::from_pool(pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let service = CheckInService::new(Arc::new(store), TokenService::new(signing_secret));
    let state = AppState {
        service,
        jwt_service: Arc::new(JwtService::new(&config.jwt_secret, config.jwt_issuer.clone())),
    };

    let app = build_app(state, &config.allowed_origins, config.rate_limit_public);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
