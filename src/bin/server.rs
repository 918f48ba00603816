//! HTTP server: loads the embedded catalogue, the tenant registry, and serves the API.

use anyhow::Context;
use gymhub::{app, catalog, load_registry_from_pool, logging, resolve, store, AppState, Settings};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let settings = Settings::from_env().context("reading settings")?;
    let config = catalog::load().context("loading catalogue")?;
    let resolved = resolve(&config).context("resolving catalogue")?;
    let pool = store::connect(&settings).await.context("connecting to database")?;
    let registry = load_registry_from_pool(&pool)
        .await
        .context("loading tenants (run setup-db first?)")?;

    let state = AppState::new(pool, config, resolved, registry);
    let listener = TcpListener::bind(("0.0.0.0", settings.http_port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutting down");
    }
}
