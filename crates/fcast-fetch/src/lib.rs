//! Weather provider adapters
//!
//! This crate is the boundary to the third-party weather API. Providers
//! return raw payloads tagged by the method that fetched them; the
//! [`RetryingFetcher`] decorator adds per-call timeouts and bounded retry
//! on transient failures.

pub mod owm;
pub mod retry;

pub use owm::*;
pub use retry::*;

use fcast_core::{Coordinates, Location, RawPayload};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("Timeout waiting for provider")]
    Timeout,

    #[error("Invalid TLS certificate: {0}")]
    InvalidCertificate(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<FetchError> },
}

impl FetchError {
    /// Failures worth another attempt within the same cycle
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout | FetchError::InvalidCertificate(_))
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Source of raw weather payloads for a location
#[async_trait::async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Provider name/identifier
    fn name(&self) -> &str;

    /// Current observation for the location
    async fn fetch_observation(&self, location: &Location) -> FetchResult<RawPayload>;

    /// Multi-step forecast at the given coordinates, one payload per point
    async fn fetch_forecast_series(
        &self,
        location: &Location,
        coordinates: Coordinates,
    ) -> FetchResult<Vec<RawPayload>>;
}
