//! MySQL backend behaviour against a live server
//!
//! To run these tests:
//! 1. Ensure MySQL is running and accessible
//! 2. Set TEST_DATABASE_URL (default: mysql://root@localhost/fcast_test)
//! 3. Run: cargo test -p fcast-store --test mysql_store -- --ignored

use fcast_core::{
    Conditions, Coordinates, DocumentUpdate, ForecastEntry, InstantDocument, InstantKey,
    Pressure, Temperature, Upsert, Wind,
};
use fcast_store::{DocumentStore, MySqlStore, PoolSettings, StoreResult, UpsertStatus};

const RALEIGH: Coordinates = Coordinates {
    lat: 35.77,
    lon: -78.63,
};

fn database_url() -> String {
    std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| "mysql://root@localhost/fcast_test".to_string())
}

/// Fresh, empty table per test
async fn open_store(table: &str) -> StoreResult<MySqlStore> {
    let store = MySqlStore::connect("test", &database_url(), table, &PoolSettings::default()).await?;
    sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
        .execute(store.pool())
        .await?;
    store.ensure_schema().await?;
    Ok(store)
}

fn conditions(temp: f64) -> Conditions {
    Conditions {
        temperature: Temperature {
            temp,
            temp_min: None,
            temp_max: None,
            feels_like: None,
        },
        humidity: Some(70.0),
        pressure: Pressure {
            press: Some(1015.0),
            sea_level: None,
        },
        wind: Wind {
            speed: Some(2.5),
            deg: Some(180.0),
            gust: None,
        },
        clouds: Some(20.0),
        rain: None,
        snow: None,
        weather_code: 801,
        status: "Clouds".into(),
        detailed_status: "few clouds".into(),
    }
}

fn key() -> InstantKey {
    InstantKey::new("27601", 1_609_470_000)
}

fn set_observed(temp: f64) -> Upsert {
    Upsert {
        key: key(),
        location: RALEIGH,
        update: DocumentUpdate::SetObserved(conditions(temp)),
    }
}

fn push_forecast(lead_time: i64, temp: f64) -> Upsert {
    Upsert {
        key: key(),
        location: RALEIGH,
        update: DocumentUpdate::PushForecast(ForecastEntry {
            lead_time,
            conditions: conditions(temp),
        }),
    }
}

#[tokio::test]
#[ignore] // Requires MySQL server
async fn test_created_then_updated() {
    let store = open_store("test_created_then_updated").await.unwrap();

    let first = store.find_one_and_update(&set_observed(281.0)).await.unwrap();
    assert_eq!(first.status, UpsertStatus::Created);

    // Writing the identical value again leaves the row unchanged
    let second = store.find_one_and_update(&set_observed(281.0)).await.unwrap();
    assert_eq!(second.status, UpsertStatus::Updated);

    let third = store.find_one_and_update(&push_forecast(10_800, 280.0)).await.unwrap();
    assert_eq!(third.status, UpsertStatus::Updated);

    assert_eq!(store.count_documents().await.unwrap(), 1);
    store.close().await;
}

#[tokio::test]
#[ignore] // Requires MySQL server
async fn test_observation_is_idempotent() {
    let store = open_store("test_observation_idempotent").await.unwrap();

    store.find_one_and_update(&set_observed(281.0)).await.unwrap();
    let result = store.find_one_and_update(&set_observed(281.0)).await.unwrap();

    assert_eq!(result.document.observed, Some(conditions(281.0)));
    assert!(result.document.forecasts.is_empty());

    // A newer observation replaces the old one
    let result = store.find_one_and_update(&set_observed(283.5)).await.unwrap();
    assert_eq!(result.document.observed, Some(conditions(283.5)));
    store.close().await;
}

#[tokio::test]
#[ignore] // Requires MySQL server
async fn test_forecasts_accumulate_in_order() {
    let store = open_store("test_forecasts_accumulate").await.unwrap();

    store.find_one_and_update(&push_forecast(32_400, 279.0)).await.unwrap();
    store.find_one_and_update(&set_observed(281.0)).await.unwrap();
    store.find_one_and_update(&push_forecast(21_600, 279.5)).await.unwrap();
    // Same point twice is kept twice
    store.find_one_and_update(&push_forecast(10_800, 280.0)).await.unwrap();
    store.find_one_and_update(&push_forecast(10_800, 280.0)).await.unwrap();

    let doc = store.find_one(&key()).await.unwrap().unwrap();
    let leads: Vec<i64> = doc.forecasts.iter().map(|f| f.lead_time).collect();
    assert_eq!(leads, vec![32_400, 21_600, 10_800, 10_800]);
    assert_eq!(doc.observed, Some(conditions(281.0)));
    assert_eq!(doc.location, RALEIGH);
    store.close().await;
}

#[tokio::test]
#[ignore] // Requires MySQL server
async fn test_replace_one_round_trip() {
    let store = open_store("test_replace_round_trip").await.unwrap();

    let mut document = InstantDocument::new(key(), RALEIGH);
    document.apply(&set_observed(281.0).update);
    document.apply(&push_forecast(10_800, 280.0).update);

    assert_eq!(store.replace_one(&document).await.unwrap(), UpsertStatus::Created);
    assert_eq!(store.find_one(&key()).await.unwrap(), Some(document.clone()));

    // Replacing with identical content still counts as an update
    assert_eq!(store.replace_one(&document).await.unwrap(), UpsertStatus::Updated);

    // Replace overwrites the forecast list instead of appending
    document.forecasts.clear();
    document.apply(&push_forecast(21_600, 279.0).update);
    assert_eq!(store.replace_one(&document).await.unwrap(), UpsertStatus::Updated);

    let stored = store.find_one(&key()).await.unwrap().unwrap();
    assert_eq!(stored.forecasts.len(), 1);
    assert_eq!(stored.forecasts[0].lead_time, 21_600);
    store.close().await;
}

#[tokio::test]
#[ignore] // Requires MySQL server
async fn test_insert_one_rejects_duplicate() {
    let store = open_store("test_insert_duplicate").await.unwrap();
    let document = InstantDocument::new(key(), RALEIGH);

    store.insert_one(&document).await.unwrap();
    let err = store.insert_one(&document).await.unwrap_err();
    assert!(err.is_duplicate_key(), "unexpected error: {err}");
    store.close().await;
}

#[tokio::test]
#[ignore] // Requires MySQL server
async fn test_missing_document() {
    let store = open_store("test_missing_document").await.unwrap();
    assert_eq!(store.find_one(&key()).await.unwrap(), None);
    store.ping().await.unwrap();
    store.close().await;
}
