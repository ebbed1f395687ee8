#![allow(dead_code)]

use fcast_core::{
    Conditions, Coordinates, InstantDocument, InstantKey, Pressure, RecordKind, Temperature,
    Upsert, WeatherRecord, Wind,
};
use fcast_store::{DocumentStore, StoreError, StoreResult, UpsertResult, UpsertStatus};

pub const RALEIGH: Coordinates = Coordinates {
    lat: 35.77,
    lon: -78.63,
};

pub fn conditions(temp: f64) -> Conditions {
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
            speed: Some(2.1),
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

pub fn observation(instant: i64, temp: f64) -> WeatherRecord {
    WeatherRecord {
        kind: RecordKind::Observation,
        zipcode: "27601".into(),
        location: RALEIGH,
        instant,
        lead_time: 0,
        conditions: conditions(temp),
    }
}

pub fn forecast(instant: i64, lead_time: i64, temp: f64) -> WeatherRecord {
    WeatherRecord {
        kind: RecordKind::ForecastPoint,
        lead_time,
        ..observation(instant, temp)
    }
}

/// What a scripted store does on every call
#[derive(Clone, Copy)]
pub enum Behavior {
    DuplicateKey,
    Unavailable,
    Broken,
}

impl Behavior {
    fn error(self) -> StoreError {
        match self {
            Behavior::DuplicateKey => StoreError::DuplicateKey {
                index: "instant.PRIMARY".into(),
            },
            Behavior::Unavailable => StoreError::Unavailable("connection refused".into()),
            Behavior::Broken => StoreError::ConfigError("table missing".into()),
        }
    }
}

/// Store that fails every operation the same way
pub struct FailingStore(pub Behavior);

#[async_trait::async_trait]
impl DocumentStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn find_one_and_update(&self, _upsert: &Upsert) -> StoreResult<UpsertResult> {
        Err(self.0.error())
    }

    async fn find_one(&self, _key: &InstantKey) -> StoreResult<Option<InstantDocument>> {
        Err(self.0.error())
    }

    async fn replace_one(&self, _document: &InstantDocument) -> StoreResult<UpsertStatus> {
        Err(self.0.error())
    }

    async fn insert_one(&self, _document: &InstantDocument) -> StoreResult<()> {
        Err(self.0.error())
    }

    async fn ping(&self) -> StoreResult<()> {
        Err(self.0.error())
    }
}
