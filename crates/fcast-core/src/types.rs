//! Core data types for weather records and instant documents

use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type (Unix epoch seconds)
pub type Timestamp = i64;

/// Geographic position of a postal code
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// A unit of work for the pipeline: one postal code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub zipcode: String,

    /// Known coordinates, if the location list supplied them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

impl Location {
    pub fn new(zipcode: impl Into<String>) -> Self {
        Self {
            zipcode: zipcode.into(),
            coordinates: None,
        }
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }
}

/// Record kind, always supplied by the caller that fetched the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Observation,
    ForecastPoint,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Observation => f.write_str("observation"),
            RecordKind::ForecastPoint => f.write_str("forecast_point"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub temp: f64,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub feels_like: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pressure {
    pub press: Option<f64>,
    pub sea_level: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: Option<f64>,
    pub deg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gust: Option<f64>,
}

/// Precipitation volume (mm) over the last hour / three hours
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Precipitation {
    #[serde(rename = "1h", default, skip_serializing_if = "Option::is_none")]
    pub one_hour: Option<f64>,

    #[serde(rename = "3h", default, skip_serializing_if = "Option::is_none")]
    pub three_hours: Option<f64>,
}

/// Canonical weather conditions stored in instant documents.
///
/// This is the whole schema: anything the provider sends that is not
/// named here never reaches the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    pub temperature: Temperature,
    pub humidity: Option<f64>,
    pub pressure: Pressure,
    pub wind: Wind,

    /// Cloud cover percentage
    pub clouds: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rain: Option<Precipitation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snow: Option<Precipitation>,

    /// Provider condition code (e.g. 800 for clear sky)
    pub weather_code: i64,

    /// Short status, e.g. "Clouds"
    pub status: String,

    /// Descriptive status, e.g. "scattered clouds"
    pub detailed_status: String,
}

/// A normalized observation or forecast point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub kind: RecordKind,
    pub zipcode: String,
    pub location: Coordinates,

    /// Bucketed target time
    pub instant: Timestamp,

    /// Seconds between issuance and `instant`; zero for observations
    pub lead_time: i64,

    pub conditions: Conditions,
}

impl WeatherRecord {
    pub fn key(&self) -> InstantKey {
        InstantKey::new(self.zipcode.clone(), self.instant)
    }
}

/// Composite primary key of an instant document
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstantKey {
    pub zipcode: String,
    pub instant: Timestamp,
}

impl InstantKey {
    pub fn new(zipcode: impl Into<String>, instant: Timestamp) -> Self {
        Self {
            zipcode: zipcode.into(),
            instant,
        }
    }
}

impl fmt::Display for InstantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.zipcode, self.instant)
    }
}

/// One forecast attached to an instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub lead_time: i64,

    #[serde(flatten)]
    pub conditions: Conditions,
}

/// The unit of storage: everything known about one postal code at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstantDocument {
    pub zipcode: String,
    pub instant: Timestamp,
    pub location: Coordinates,

    /// Latest observation for this instant (last write wins)
    pub observed: Option<Conditions>,

    /// Forecasts in arrival order
    #[serde(default)]
    pub forecasts: Vec<ForecastEntry>,
}

impl InstantDocument {
    /// Empty document, as created by the first upsert for a key
    pub fn new(key: InstantKey, location: Coordinates) -> Self {
        Self {
            zipcode: key.zipcode,
            instant: key.instant,
            location,
            observed: None,
            forecasts: Vec::new(),
        }
    }

    pub fn key(&self) -> InstantKey {
        InstantKey::new(self.zipcode.clone(), self.instant)
    }

    /// Apply an update in place. Location is left as it was at creation.
    pub fn apply(&mut self, update: &DocumentUpdate) {
        match update {
            DocumentUpdate::SetObserved(conditions) => {
                self.observed = Some(conditions.clone());
            }
            DocumentUpdate::PushForecast(entry) => {
                self.forecasts.push(entry.clone());
            }
        }
    }
}

/// Field-level update applied by a keyed upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentUpdate {
    /// Replace `observed` wholesale
    SetObserved(Conditions),

    /// Append to `forecasts`
    PushForecast(ForecastEntry),
}

/// Filter plus update, applied atomically by a document store
#[derive(Debug, Clone, PartialEq)]
pub struct Upsert {
    pub key: InstantKey,

    /// Location written only when the upsert creates the document
    pub location: Coordinates,

    pub update: DocumentUpdate,
}
