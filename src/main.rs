use anyhow::Context;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use cafe_api_rust::app;
use cafe_api_rust::config::{AppConfig, Environment};
use cafe_api_rust::state::AppState;
use cafe_api_rust::store::memory::MemoryStore;
use cafe_api_rust::store::{Principal, Role};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up SECRET_JWT_SEED, GOOGLE_ID, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env();
    config.validate()?;
    tracing::info!("Starting Cafe API in {:?} mode", config.environment);

    let port = config.server.port;
    let environment = config.environment.clone();
    let (state, store) = AppState::in_memory(config);

    if environment == Environment::Development {
        seed_dev_fixtures(&store).await?;
    }

    let shutdown = state.shutdown.clone();
    let router = app::router(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Cafe API listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("server error")?;

    Ok(())
}

/// The in-memory store starts empty, so the dev profile gets one admin
/// account to log in with.
async fn seed_dev_fixtures(store: &MemoryStore) -> anyhow::Result<()> {
    let email = "admin@cafe.local";
    store
        .insert_principal(Principal {
            id: Uuid::new_v4(),
            name: "Dev Admin".to_string(),
            email: email.to_string(),
            role: Role::Admin,
            active: true,
            federated: false,
            password_hash: Some(
                bcrypt::hash("admin123", bcrypt::DEFAULT_COST).context("hashing dev password")?,
            ),
        })
        .await;
    tracing::info!(%email, "seeded development admin account");
    Ok(())
}

/// Waits for ctrl-c, then cancels the shared token so in-flight retry loops
/// abort instead of riding out their backoff.
async fn shutdown_signal(shutdown: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to install ctrl-c handler");
        return;
    }
    tracing::info!("shutdown requested, cancelling in-flight work");
    shutdown.cancel();
}
