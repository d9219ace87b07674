use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;

use super::{Observation, PLAUSIBLE_MAX, PLAUSIBLE_MIN};
use crate::config::SeriesConfig;

/// Value FRED reports for dates without a published observation
const UNAVAILABLE_SENTINEL: &str = ".";

/// Per-request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounded retry for transport failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Client for the FRED series observations endpoint
#[derive(Debug, Clone)]
pub struct FredClient {
    http_client: reqwest::Client,
    base_url: String,
    series_id: String,
    api_key: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    value: String,
}

impl FredClient {
    pub fn new(config: &SeriesConfig) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(TransportError::Request)?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            series_id: config.id.clone(),
            api_key: config.api_key.clone(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn series_id(&self) -> &str {
        &self.series_id
    }

    /// Fetch the newest `window` observations, newest first.
    ///
    /// Transport failures are retried up to the policy bound. An empty or
    /// implausible batch fails immediately.
    pub async fn fetch(&self, window: usize) -> Result<Vec<Observation>, FetchError> {
        let mut attempt = 0;

        let response = loop {
            attempt += 1;
            match self.request(window).await {
                Ok(response) => break response,
                Err(e) if attempt < self.retry.max_attempts => {
                    tracing::warn!(
                        series_id = %self.series_id,
                        attempt,
                        error = %e,
                        "Series request failed, retrying in {:?}",
                        self.retry.delay
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => {
                    return Err(FetchError::FetchFailed {
                        attempts: attempt,
                        source: e,
                    })
                }
            }
        };

        let body: ObservationsResponse = serde_json::from_str(&response)?;
        let observations = Self::usable_observations(body.observations);

        let newest = observations.first().ok_or(FetchError::EmptyResult)?;
        if !newest.is_plausible() {
            return Err(FetchError::OutOfRange {
                value: newest.value,
                min: PLAUSIBLE_MIN,
                max: PLAUSIBLE_MAX,
            });
        }

        tracing::debug!(
            series_id = %self.series_id,
            count = observations.len(),
            "Fetched observations"
        );

        Ok(observations)
    }

    /// Issue a single request and return the raw body of a 2xx response
    async fn request(&self, window: usize) -> Result<String, TransportError> {
        let url = format!("{}/fred/series/observations", self.base_url);
        let limit = window.to_string();

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("series_id", self.series_id.as_str()),
                ("api_key", self.api_key.as_str()),
                ("file_type", "json"),
                ("sort_order", "desc"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| TransportError::Request(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .text()
            .await
            .map_err(|e| TransportError::Request(e.without_url()))
    }

    /// Drop unavailable or malformed points and order newest first
    fn usable_observations(raw: Vec<RawObservation>) -> Vec<Observation> {
        let mut observations: Vec<Observation> = raw
            .into_iter()
            .filter(|obs| obs.value != UNAVAILABLE_SENTINEL)
            .filter_map(|obs| {
                let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d");
                let value = obs.value.trim().parse::<f64>();
                match (date, value) {
                    (Ok(date), Ok(value)) => Some(Observation::new(date, value)),
                    _ => {
                        tracing::warn!(
                            date = %obs.date,
                            value = %obs.value,
                            "Skipping malformed observation"
                        );
                        None
                    }
                }
            })
            .collect();

        observations.sort_by(|a, b| b.date.cmp(&a.date));
        observations
    }
}

/// Failure of a single request
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request error: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Series fetch errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Fetch failed after {attempts} attempts: {source}")]
    FetchFailed {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("No usable observations returned")]
    EmptyResult,

    #[error("Latest value {value} outside plausible range {min}-{max}")]
    OutOfRange { value: f64, min: f64, max: f64 },

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// Transport failures that exhausted the retry bound
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::FetchFailed { .. })
    }
}
