//! Raw provider payloads and the allow-listed view the normalizer reads
//!
//! Bodies follow the OpenWeatherMap 2.5 REST shapes. Only the keys named in
//! the structs below are read; everything else in the body is ignored.

use serde::{Deserialize, Serialize};

use crate::types::{Coordinates, Precipitation, Timestamp};

/// A payload as handed over by the fetch adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPayload {
    /// Postal code the payload was fetched for
    pub zipcode: String,

    /// When the adapter received the payload (forecast issuance time)
    pub received_at: Timestamp,

    /// Coordinates supplied by the adapter; falls back to `body.coord`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,

    pub body: serde_json::Value,
}

impl RawPayload {
    pub fn new(zipcode: impl Into<String>, received_at: Timestamp, body: serde_json::Value) -> Self {
        Self {
            zipcode: zipcode.into(),
            received_at,
            location: None,
            body,
        }
    }

    pub fn with_location(mut self, location: Coordinates) -> Self {
        self.location = Some(location);
        self
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawBody {
    pub dt: Option<Timestamp>,
    pub coord: Option<Coordinates>,
    pub main: Option<RawMain>,
    #[serde(default)]
    pub weather: Vec<RawWeather>,
    pub wind: Option<RawWind>,
    pub clouds: Option<RawClouds>,
    pub rain: Option<Precipitation>,
    pub snow: Option<Precipitation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMain {
    pub temp: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub feels_like: Option<f64>,
    pub pressure: Option<f64>,
    pub sea_level: Option<f64>,
    pub humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawWeather {
    pub id: i64,
    pub main: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawWind {
    pub speed: Option<f64>,
    pub deg: Option<f64>,
    pub gust: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawClouds {
    pub all: Option<f64>,
}
