//! cqlgate server entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cqlgate::config::{Config, LogFormat};
use cqlgate::graphql::{ExecutionEnv, build_admin_schema};
use cqlgate::services::{
    HttpServerService, SchemaManager, SchemaUpdater, Service, ServicesManager,
};
use cqlgate::store::MemoryStore;

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cqlgate=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(Config::from_env().context("Failed to load configuration")?);
    init_tracing(config.log_format);

    tracing::info!("Starting cqlgate");

    let store = match &config.seed_file {
        Some(path) => {
            let store = MemoryStore::from_seed_file(path)
                .await
                .with_context(|| format!("Failed to load seed file {}", path.display()))?;
            tracing::info!(seed = %path.display(), "Memory store seeded");
            Arc::new(store)
        }
        None => {
            tracing::warn!("No SEED_FILE set; starting with an empty memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let env = ExecutionEnv::new(store.clone(), config.execution.clone());
    let schemas = Arc::new(
        SchemaManager::new(store, env, config.naming).with_keyspaces(config.keyspaces.clone()),
    );
    let admin = build_admin_schema(schemas.clone());

    // First builds happen here so a broken keyspace is reported at startup;
    // it stays unavailable until a later refresh succeeds.
    let keyspaces = schemas
        .managed_keyspaces()
        .await
        .context("Failed to list keyspaces")?;
    for keyspace in &keyspaces {
        if let Err(e) = schemas.refresh(keyspace).await {
            tracing::error!(keyspace = %keyspace, error = %e, "Initial schema build failed");
        }
    }

    let services = Arc::new(ServicesManager::new());
    let mut updater_names = Vec::with_capacity(keyspaces.len());
    for keyspace in &keyspaces {
        let updater = Arc::new(SchemaUpdater::new(
            schemas.clone(),
            keyspace.clone(),
            config.schema_update_interval,
        ));
        updater_names.push(updater.name().to_string());
        services.register(updater).await;
    }
    let http = HttpServerService::new(
        Arc::downgrade(&services),
        config.clone(),
        schemas.clone(),
        admin,
    )
    .with_dependencies(updater_names);
    services.register(Arc::new(http)).await;
    // Keyspaces first referenced later get their updater on first publish.
    schemas.launch_updaters(&services, config.schema_update_interval);

    services.start_all().await.context("Failed to start services")?;
    tracing::info!(keyspaces = keyspaces.len(), "cqlgate started");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");
    services.stop_all().await?;
    Ok(())
}
