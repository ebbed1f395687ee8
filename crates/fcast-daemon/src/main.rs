//! Forecast ETL daemon - batch entry point
//!
//! This binary coordinates:
//! - Observation and forecast extraction (OpenWeatherMap)
//! - Reconciliation into the local staging store
//! - Replication to the remote store of record

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use fcast_config::AppConfig;
use fcast_daemon::stores::{open_local, open_remote};
use fcast_daemon::{BatchRunner, Scheduler};
use fcast_fetch::{OpenWeatherMapProvider, RetryingFetcher, WeatherProvider};
use fcast_obs::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    let format = config
        .log
        .format
        .parse::<LogFormat>()
        .map_err(anyhow::Error::msg)?;
    fcast_obs::init("fcastd", format);

    info!("Starting forecast ETL daemon");
    config.validate().context("Invalid configuration")?;

    // Two distinct handles; an unreachable store at start-up is fatal
    let local = open_local(&config.local).await?;
    local.ping().await.context("Local store ping failed")?;
    let remote = open_remote(&config.remote).await?;
    remote.ping().await.context("Remote store ping failed")?;
    info!("Store connections verified");

    let owm = OpenWeatherMapProvider::new(config.owm_settings())
        .context("Failed to build weather provider")?;
    let provider: Arc<dyn WeatherProvider> =
        Arc::new(RetryingFetcher::new(owm, config.retry_policy()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!("Failed to listen for shutdown signal: {}", e);
                // Hold the sender; dropping it would stop the scheduler
                std::future::pending::<()>().await;
            }
        }
    });

    let runner = BatchRunner::new(provider, local, remote, shutdown_rx.clone());
    let mut scheduler = Scheduler::new(
        runner,
        config.batch.locations_file.clone(),
        config.interval(),
        shutdown_rx,
    );

    let summary = scheduler.run().await?;
    info!(
        processed = summary.locations_processed,
        skipped = summary.locations_skipped.len(),
        next_index = summary.next_index,
        "Forecast ETL daemon stopped"
    );
    Ok(())
}
