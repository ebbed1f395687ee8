//! Record to instant-document merge

use crate::{ReconcileError, ReconcileOutcome, ReconcileResult};
use fcast_core::{DocumentUpdate, ForecastEntry, RecordKind, Upsert, WeatherRecord};
use fcast_store::{BulkWriteSummary, DocumentStore};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Build the keyed update a record stands for.
///
/// Observations replace `observed`; forecast points are appended to
/// `forecasts` without deduplication.
pub fn upsert_for(record: &WeatherRecord) -> Upsert {
    let update = match record.kind {
        RecordKind::Observation => DocumentUpdate::SetObserved(record.conditions.clone()),
        RecordKind::ForecastPoint => DocumentUpdate::PushForecast(ForecastEntry {
            lead_time: record.lead_time,
            conditions: record.conditions.clone(),
        }),
    };

    Upsert {
        key: record.key(),
        location: record.location,
        update,
    }
}

/// Merges records into the local staging store
pub struct Reconciler {
    store: Arc<dyn DocumentStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    #[instrument(skip(self, record), fields(key = %record.key(), kind = %record.kind))]
    pub async fn reconcile(&self, record: &WeatherRecord) -> ReconcileResult<ReconcileOutcome> {
        let result = self
            .store
            .find_one_and_update(&upsert_for(record))
            .await
            .map_err(ReconcileError::from)?;

        let outcome = ReconcileOutcome::from(result.status);
        debug!(?outcome, "Reconciled record");
        Ok(outcome)
    }

    /// Reconcile a batch in order. A failing record does not stop the rest;
    /// only an unavailable store fails the call.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn reconcile_all(&self, records: &[WeatherRecord]) -> ReconcileResult<BulkWriteSummary> {
        let upserts: Vec<Upsert> = records.iter().map(upsert_for).collect();
        let summary = self
            .store
            .bulk_write(&upserts)
            .await
            .map_err(ReconcileError::Store)?;

        for (index, error) in &summary.failed {
            warn!(index, key = %upserts[*index].key, error = %error, "Record not reconciled");
        }
        debug!(
            created = summary.created,
            updated = summary.updated,
            failed = summary.failed.len(),
            "Reconciled batch"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fcast_core::{Conditions, Coordinates, Pressure, Temperature, Wind};

    fn record(kind: RecordKind, lead_time: i64) -> WeatherRecord {
        WeatherRecord {
            kind,
            zipcode: "27601".into(),
            location: Coordinates {
                lat: 35.77,
                lon: -78.63,
            },
            instant: 1609470000,
            lead_time,
            conditions: Conditions {
                temperature: Temperature {
                    temp: 281.0,
                    temp_min: None,
                    temp_max: None,
                    feels_like: None,
                },
                humidity: None,
                pressure: Pressure {
                    press: None,
                    sea_level: None,
                },
                wind: Wind {
                    speed: None,
                    deg: None,
                    gust: None,
                },
                clouds: None,
                rain: None,
                snow: None,
                weather_code: 800,
                status: "Clear".into(),
                detailed_status: "clear sky".into(),
            },
        }
    }

    #[test]
    fn test_observation_sets_observed() {
        let obs = record(RecordKind::Observation, 0);
        let upsert = upsert_for(&obs);
        assert_eq!(upsert.key, obs.key());
        assert_eq!(upsert.location, obs.location);
        assert_eq!(upsert.update, DocumentUpdate::SetObserved(obs.conditions));
    }

    #[test]
    fn test_forecast_pushes_entry() {
        let point = record(RecordKind::ForecastPoint, 10800);
        match upsert_for(&point).update {
            DocumentUpdate::PushForecast(entry) => {
                assert_eq!(entry.lead_time, 10800);
                assert_eq!(entry.conditions, point.conditions);
            }
            other => panic!("unexpected update {other:?}"),
        }
    }
}
