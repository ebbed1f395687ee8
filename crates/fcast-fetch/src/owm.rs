//! OpenWeatherMap 2.5 REST provider

use crate::{FetchError, FetchResult, WeatherProvider};
use fcast_core::{Coordinates, Location, RawPayload};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/";

/// Unit system requested from the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Standard,
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Standard => "standard",
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OwmSettings {
    pub base_url: String,
    pub api_key: String,
    /// ISO country code appended to the postal code
    pub country: String,
    pub units: Units,
    pub request_timeout: Duration,
}

impl Default for OwmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            country: "us".to_string(),
            units: Units::Standard,
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastEnvelope {
    #[serde(default)]
    list: Vec<serde_json::Value>,
    city: Option<ForecastCity>,
}

#[derive(Debug, Deserialize)]
struct ForecastCity {
    coord: Option<Coordinates>,
}

pub struct OpenWeatherMapProvider {
    client: Client,
    base_url: Url,
    api_key: String,
    country: String,
    units: Units,
}

impl OpenWeatherMapProvider {
    pub fn new(settings: OwmSettings) -> FetchResult<Self> {
        if settings.api_key.is_empty() {
            return Err(FetchError::Http("missing API key".into()));
        }

        // Url::join drops the last path segment unless it ends with '/'
        let mut base = settings.base_url;
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| FetchError::Http(format!("invalid base URL {base}: {e}")))?;

        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(map_reqwest_error)?;

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key,
            country: settings.country,
            units: settings.units,
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> FetchResult<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| FetchError::Http(format!("invalid endpoint {path}: {e}")))?;
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())))
            .append_pair("units", self.units.as_str())
            .append_pair("appid", &self.api_key);
        Ok(url)
    }

    async fn get_json(&self, url: Url, subject: &str) -> FetchResult<serde_json::Value> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(subject.to_string()));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(FetchError::Http(format!("{status} {text}")));
        }

        resp.json()
            .await
            .map_err(|e| FetchError::InvalidPayload(e.to_string()))
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Map a transport error onto the fetch error taxonomy
fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::Timeout;
    }

    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        if cause.to_string().to_lowercase().contains("certificate") {
            return FetchError::InvalidCertificate(cause.to_string());
        }
        source = cause.source();
    }

    FetchError::Http(err.to_string())
}

#[async_trait::async_trait]
impl WeatherProvider for OpenWeatherMapProvider {
    fn name(&self) -> &str {
        "openweathermap"
    }

    #[instrument(skip(self, location), fields(zipcode = %location.zipcode))]
    async fn fetch_observation(&self, location: &Location) -> FetchResult<RawPayload> {
        let url = self.endpoint(
            "data/2.5/weather",
            &[("zip", format!("{},{}", location.zipcode, self.country))],
        )?;
        let body = self.get_json(url, &location.zipcode).await?;

        let mut payload = RawPayload::new(location.zipcode.clone(), now(), body);
        if let Some(coordinates) = location.coordinates {
            payload = payload.with_location(coordinates);
        }
        debug!("Fetched observation");
        Ok(payload)
    }

    #[instrument(skip(self, location), fields(zipcode = %location.zipcode))]
    async fn fetch_forecast_series(
        &self,
        location: &Location,
        coordinates: Coordinates,
    ) -> FetchResult<Vec<RawPayload>> {
        let url = self.endpoint(
            "data/2.5/forecast",
            &[
                ("lat", coordinates.lat.to_string()),
                ("lon", coordinates.lon.to_string()),
            ],
        )?;
        let body = self.get_json(url, &location.zipcode).await?;
        let received_at = now();

        let envelope: ForecastEnvelope = serde_json::from_value(body)
            .map_err(|e| FetchError::InvalidPayload(e.to_string()))?;
        let point_location = envelope
            .city
            .and_then(|city| city.coord)
            .unwrap_or(coordinates);

        let series: Vec<RawPayload> = envelope
            .list
            .into_iter()
            .map(|point| {
                RawPayload::new(location.zipcode.clone(), received_at, point)
                    .with_location(point_location)
            })
            .collect();
        debug!(points = series.len(), "Fetched forecast series");
        Ok(series)
    }
}
