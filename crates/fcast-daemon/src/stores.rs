//! Store handles built from configuration

use anyhow::{Context, Result};
use fcast_config::{Backend, StoreConfig};
use fcast_store::{DocumentStore, MemoryStore, MySqlConnectOptions, MySqlStore, PoolSettings};
use std::sync::Arc;
use tracing::info;

fn pool_settings(config: &StoreConfig) -> PoolSettings {
    PoolSettings {
        max_connections: config.max_connections,
        acquire_timeout: config.acquire_timeout(),
        operation_timeout: config.operation_timeout(),
    }
}

fn local_connect_options(config: &StoreConfig) -> MySqlConnectOptions {
    let opts = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.user);
    if config.password.is_empty() {
        opts
    } else {
        opts.password(&config.password)
    }
}

/// Local staging store, connected from host and port
pub async fn open_local(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>> {
    if config.backend == Backend::Memory {
        info!("Using in-memory local store");
        return Ok(Arc::new(MemoryStore::new("local")));
    }

    let opts = local_connect_options(config);
    let store = MySqlStore::connect_with("local", opts, &config.table, &pool_settings(config))
        .await
        .with_context(|| format!("Failed to connect to local store at {}:{}", config.host, config.port))?;
    store
        .ensure_schema()
        .await
        .context("Failed to prepare local schema")?;
    info!(host = %config.host, port = config.port, table = %config.table, "Connected to local store");
    Ok(Arc::new(store))
}

/// Remote store of record, connected from its credential-bearing URL
pub async fn open_remote(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>> {
    if config.backend == Backend::Memory {
        info!("Using in-memory remote store");
        return Ok(Arc::new(MemoryStore::new("remote")));
    }

    let url = config.url().context("Invalid remote store settings")?;
    let store = MySqlStore::connect("remote", url.as_str(), &config.table, &pool_settings(config))
        .await
        .with_context(|| format!("Failed to connect to remote store at {}", config.host))?;
    store
        .ensure_schema()
        .await
        .context("Failed to prepare remote schema")?;
    info!(host = %config.host, table = %config.table, "Connected to remote store");
    Ok(Arc::new(store))
}
