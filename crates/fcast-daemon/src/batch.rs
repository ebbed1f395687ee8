//! One extract, reconcile and replicate cycle over the location list

use anyhow::{anyhow, Result};
use fcast_core::{normalize, normalize_series, InstantKey, Location, NormalizeError, RecordKind};
use fcast_fetch::{FetchError, WeatherProvider};
use fcast_reconcile::{
    ReconcileError, ReconcileOutcome, Reconciler, ReplicateError, Replicator,
};
use fcast_store::{DocumentStore, StoreError};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// Why a location produced nothing this cycle
#[derive(Debug, Error)]
enum LocationError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("malformed observation: {0}")]
    Malformed(#[from] NormalizeError),

    #[error("conflicting write on {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(StoreError),

    /// Local store gone; ends the batch
    #[error("local store unavailable: {0}")]
    LocalUnavailable(StoreError),
}

impl From<ReconcileError> for LocationError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Conflict(index) => LocationError::Conflict(index),
            ReconcileError::Store(e) if e.is_unavailable() => LocationError::LocalUnavailable(e),
            ReconcileError::Store(e) => LocationError::Store(e),
        }
    }
}

impl From<ReplicateError> for LocationError {
    fn from(err: ReplicateError) -> Self {
        match err {
            ReplicateError::LocalUnavailable(e) => LocationError::LocalUnavailable(e),
        }
    }
}

/// Counters for one cycle, logged when it ends
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleSummary {
    /// Locations whose observation was reconciled. Failed forecast points do
    /// not move a location out of this count.
    pub locations_processed: usize,
    /// Skipped locations with the reason
    pub locations_skipped: Vec<(String, String)>,
    pub documents_created: usize,
    pub documents_updated: usize,
    /// Forecast points dropped by the normalizer
    pub points_rejected: usize,
    pub propagated: usize,
    pub already_present: usize,
    pub replication_failed: usize,
    /// Duplicate-key writes, counted per conflicting write. An observation
    /// conflict skips its location; a forecast point conflict drops only
    /// that point.
    pub conflicts: usize,
    /// Index of the first location not yet handled
    pub next_index: usize,
    pub interrupted: bool,
}

impl CycleSummary {
    fn record_outcome(&mut self, outcome: ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Created => self.documents_created += 1,
            ReconcileOutcome::Updated => self.documents_updated += 1,
        }
    }

    pub fn log(&self) {
        info!(
            processed = self.locations_processed,
            skipped = self.locations_skipped.len(),
            created = self.documents_created,
            updated = self.documents_updated,
            points_rejected = self.points_rejected,
            propagated = self.propagated,
            already_present = self.already_present,
            replication_failed = self.replication_failed,
            conflicts = self.conflicts,
            next_index = self.next_index,
            interrupted = self.interrupted,
            "Cycle finished"
        );
    }
}

/// Runs the per-location pipeline with one sequential worker
pub struct BatchRunner {
    provider: Arc<dyn WeatherProvider>,
    reconciler: Reconciler,
    replicator: Replicator,
    shutdown: watch::Receiver<bool>,
}

impl BatchRunner {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        local: Arc<dyn DocumentStore>,
        remote: Arc<dyn DocumentStore>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            provider,
            reconciler: Reconciler::new(local.clone()),
            replicator: Replicator::new(local, remote),
            shutdown,
        }
    }

    pub async fn run_cycle(&self, locations: &[Location]) -> Result<CycleSummary> {
        self.run_from(locations, 0).await
    }

    /// Process `locations[start..]`. Per-location failures are recorded and
    /// skipped; only a lost local store fails the cycle.
    pub async fn run_from(&self, locations: &[Location], start: usize) -> Result<CycleSummary> {
        let started_at = chrono::Utc::now();
        let mut summary = CycleSummary {
            next_index: start,
            ..CycleSummary::default()
        };
        info!(
            locations = locations.len(),
            start,
            started_at = %started_at.to_rfc3339(),
            "Cycle started"
        );

        for (index, location) in locations.iter().enumerate().skip(start) {
            if *self.shutdown.borrow() {
                warn!(next_index = index, "Shutdown requested, stopping cycle");
                summary.interrupted = true;
                break;
            }

            match self.process_location(location, &mut summary).await {
                Ok(()) => summary.locations_processed += 1,
                Err(LocationError::LocalUnavailable(e)) => {
                    error!(zipcode = %location.zipcode, index, error = %e, "Local store lost");
                    summary.log();
                    return Err(anyhow!(
                        "local store unavailable at location {index} ({}): {e}",
                        location.zipcode
                    ));
                }
                Err(e) => {
                    if matches!(e, LocationError::Conflict(_)) {
                        summary.conflicts += 1;
                    }
                    warn!(zipcode = %location.zipcode, error = %e, "Skipping location");
                    summary
                        .locations_skipped
                        .push((location.zipcode.clone(), e.to_string()));
                }
            }
            summary.next_index = index + 1;
        }

        debug!(
            elapsed_ms = (chrono::Utc::now() - started_at).num_milliseconds(),
            "Cycle elapsed"
        );
        summary.log();
        Ok(summary)
    }

    #[instrument(skip(self, location, summary), fields(zipcode = %location.zipcode))]
    async fn process_location(
        &self,
        location: &Location,
        summary: &mut CycleSummary,
    ) -> Result<(), LocationError> {
        // Extract and normalize everything before the first write
        let raw = self.provider.fetch_observation(location).await?;
        let observation = normalize(&raw, RecordKind::Observation)?;
        let coordinates = location.coordinates.unwrap_or(observation.location);

        let series = self
            .provider
            .fetch_forecast_series(location, coordinates)
            .await?;
        let (forecasts, rejected) = normalize_series(&series, RecordKind::ForecastPoint);
        for (index, e) in &rejected {
            warn!(index, error = %e, "Dropping forecast point");
        }
        summary.points_rejected += rejected.len();

        // Reconcile into the local store
        let outcome = self.reconciler.reconcile(&observation).await?;
        summary.record_outcome(outcome);

        let bulk = self.reconciler.reconcile_all(&forecasts).await?;
        summary.documents_created += bulk.created;
        summary.documents_updated += bulk.updated;

        let failed: BTreeSet<usize> = bulk.failed.iter().map(|(index, _)| *index).collect();
        for (_, e) in &bulk.failed {
            if e.is_duplicate_key() {
                summary.conflicts += 1;
            }
        }

        // Replicate every key touched this cycle
        let mut keys: BTreeSet<InstantKey> = BTreeSet::new();
        keys.insert(observation.key());
        keys.extend(
            forecasts
                .iter()
                .enumerate()
                .filter(|(index, _)| !failed.contains(index))
                .map(|(_, record)| record.key()),
        );
        let keys: Vec<InstantKey> = keys.into_iter().collect();

        let replication = self.replicator.replicate_all(&keys).await?;
        summary.propagated += replication.propagated;
        summary.already_present += replication.already_present;
        summary.replication_failed += replication.failed.len();
        for (key, reason) in &replication.failed {
            warn!(%key, reason = %reason, "Replication failed, local is ahead of remote");
        }

        debug!(
            forecasts = forecasts.len(),
            keys = keys.len(),
            "Location processed"
        );
        Ok(())
    }
}
