//! Bounded retry with per-call timeouts

use crate::{FetchError, FetchResult, WeatherProvider};
use fcast_core::{Coordinates, Location, RawPayload};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::time::{sleep, timeout, Duration};
use tracing::warn;

/// Hard ceiling on attempts, whatever the configuration says
pub const MAX_ATTEMPTS_LIMIT: u32 = 10;

/// Longest wait between two attempts
const MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    backoff: Backoff,
    request_timeout: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to `1..=MAX_ATTEMPTS_LIMIT`
    pub fn new(
        max_attempts: u32,
        delay: Duration,
        backoff: Backoff,
        request_timeout: Duration,
    ) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS_LIMIT),
            delay,
            backoff,
            request_timeout,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.delay.saturating_mul(factor).min(MAX_DELAY)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Backoff::Fixed, Duration::from_secs(10))
    }
}

/// Provider decorator that times out each call and retries transient errors
pub struct RetryingFetcher<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: WeatherProvider> RetryingFetcher<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    async fn with_retry<T, F, Fut>(&self, what: &str, zipcode: &str, mut call: F) -> FetchResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        let mut attempt = 1;
        loop {
            let result = match timeout(self.policy.request_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    warn!(
                        zipcode,
                        what,
                        attempt,
                        error = %e,
                        "Transient fetch error, trying again"
                    );
                    sleep(self.policy.delay_after(attempt)).await;
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    return Err(FetchError::Exhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait::async_trait]
impl<P: WeatherProvider> WeatherProvider for RetryingFetcher<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch_observation(&self, location: &Location) -> FetchResult<RawPayload> {
        self.with_retry("observation", &location.zipcode, || {
            self.inner.fetch_observation(location)
        })
        .await
    }

    async fn fetch_forecast_series(
        &self,
        location: &Location,
        coordinates: Coordinates,
    ) -> FetchResult<Vec<RawPayload>> {
        self.with_retry("forecast", &location.zipcode, || {
            self.inner.fetch_forecast_series(location, coordinates)
        })
        .await
    }
}
