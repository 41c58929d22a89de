use std::net::SocketAddr;

use airtix_api::{app, AppState, AuthConfig};
use airtix_store::{app_config::Config, DbClient};
use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "airtix_api=debug,airtix_core=info,airtix_store=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Airtix API on port {}", config.server.port);

    let auth = AuthConfig {
        secret: config.auth.jwt_secret.clone(),
        expiration: config.auth.jwt_expiration_seconds,
    };

    let state = if config.database.is_in_memory() {
        tracing::warn!("Using the in-memory store; data is lost on shutdown");
        AppState::in_memory(config.booking.clone(), auth)
    } else {
        let db = DbClient::connect(&config.database)
            .await
            .context("Failed to connect to Postgres")?;
        db.migrate().await.context("Failed to run migrations")?;
        AppState::with_database(&db, config.booking.clone(), auth)
    };

    if let Some(admin) = &config.admin {
        state
            .admin
            .ensure_admin(&admin.username, &admin.password)
            .await
            .context("Failed to provision admin account")?;
    }

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
