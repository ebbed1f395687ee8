//! Cycle scheduling

use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::info;

use crate::batch::{BatchRunner, CycleSummary};
use crate::locations::read_locations;

/// Re-reads the location list and runs a cycle, once or every `interval`
pub struct Scheduler {
    runner: BatchRunner,
    locations_file: PathBuf,
    interval: Option<Duration>,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(
        runner: BatchRunner,
        locations_file: PathBuf,
        interval: Option<Duration>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            runner,
            locations_file,
            interval,
            shutdown,
        }
    }

    /// Run until the single cycle ends, shutdown is requested or the local
    /// store is lost. Returns the summary of the last cycle.
    pub async fn run(&mut self) -> Result<CycleSummary> {
        loop {
            let locations = read_locations(&self.locations_file)?;
            let summary = self.runner.run_cycle(&locations).await?;

            let Some(interval) = self.interval else {
                return Ok(summary);
            };
            if summary.interrupted || *self.shutdown.borrow() {
                return Ok(summary);
            }

            info!(next_cycle_in_secs = interval.as_secs(), "Waiting for next cycle");
            tokio::select! {
                _ = sleep(interval) => {}
                changed = self.shutdown.changed() => {
                    // A dropped sender also ends the loop
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("Shutdown requested while idle");
                        return Ok(summary);
                    }
                }
            }
        }
    }
}
