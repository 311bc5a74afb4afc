use std::sync::Arc;

use anyhow::{Context, Result};
use pipehub::auth::HubAuth;
use pipehub::blob::ArtifactStore;
use pipehub::catalog::PluginCatalog;
use pipehub::http::{self, AppState};
use pipehub::license::LicenseStore;
use pipehub::stats::StatsAggregator;
use pipehub::update::UpdateChecker;
use pipehub::{HubConfig, Storage};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pipehub=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load .env for local dev (if present)
    if dotenvy::dotenv().is_ok() {
        tracing::info!("Loaded .env");
    }

    tracing::info!("Starting PipeHub server");

    let config = HubConfig::from_env()?;
    tracing::info!(
        "Configuration loaded: port={}, db_path={}",
        config.server.port,
        config.storage.db_path
    );

    let storage = Storage::open(&config.storage.db_path).context("failed to open database")?;
    let artifacts = ArtifactStore::new(&config.storage.artifact_dir)
        .context("failed to open artifact store")?;

    let catalog = Arc::new(PluginCatalog::new(storage.clone(), artifacts));
    let licenses = Arc::new(LicenseStore::new(storage.clone()));
    let stats = Arc::new(StatsAggregator::new(storage));
    let checker = Arc::new(UpdateChecker::new(
        Arc::clone(&catalog),
        Arc::clone(&licenses),
        &config.server.base_url,
    ));
    let auth = Arc::new(HubAuth::new(&config.auth));

    if !auth.is_enabled() {
        tracing::warn!("Authentication is disabled, all admin requests are accepted");
    }

    let state = AppState::new(catalog, licenses, stats, checker, auth);
    http::run_http_server(state, config.server.port).await?;
    Ok(())
}
