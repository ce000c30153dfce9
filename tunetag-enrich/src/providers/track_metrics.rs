//! Track analytics from the third-party track-analysis API
//!
//! Requests are paced client-side by a `governor` quota. A 429 answer is
//! retried with exponential backoff up to `RetryPolicy::max_attempts`
//! requests in total; the backoff wait is cancellable.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::capabilities::TrackMetricsCredential;
use super::{ConcurrencyPolicy, Enrichment, EnrichmentProvider, ProviderError};
use crate::models::analysis::TRACK_METRIC_TAGS;
use crate::models::{MediaFile, Tags, TrackMetrics};

/// Per-request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default outbound request budget
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 1;

/// Retry behaviour for 429 answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total requests per item, first one included
    pub max_attempts: u32,
    /// Wait before the second request; doubles for each further one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Wait before request number `attempt` (2-based; 1 has no wait)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(2).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

/// Subset of the API answer we keep
#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    energy: i64,
    happiness: i64,
    instrumentalness: i64,
}

type DirectLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Client for the track-analysis API
pub struct TrackMetricsProvider {
    client: Client,
    credential: Option<TrackMetricsCredential>,
    endpoint: String,
    host: String,
    retry: RetryPolicy,
    rate_limiter: DirectLimiter,
}

impl std::fmt::Debug for TrackMetricsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackMetricsProvider")
            .field("endpoint", &self.endpoint)
            .field("available", &self.credential.is_some())
            .field("retry", &self.retry)
            .finish()
    }
}

impl TrackMetricsProvider {
    pub fn new(
        credential: Option<TrackMetricsCredential>,
        endpoint: impl Into<String>,
        requests_per_second: NonZeroU32,
        retry: RetryPolicy,
    ) -> Result<Self, ProviderError> {
        let endpoint = endpoint.into();
        let host = reqwest::Url::parse(&endpoint)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .ok_or_else(|| ProviderError::InvalidRequest(format!("Bad endpoint URL: {}", endpoint)))?;

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            credential,
            endpoint,
            host,
            retry,
            rate_limiter: RateLimiter::direct(Quota::per_second(requests_per_second)),
        })
    }

    pub fn is_available(&self) -> bool {
        self.credential.is_some()
    }

    /// Fetch analytics for one track
    pub async fn fetch(
        &self,
        artist: &str,
        title: &str,
        cancel: &CancellationToken,
    ) -> Result<TrackMetrics, ProviderError> {
        let credential = self
            .credential
            .as_ref()
            .ok_or(ProviderError::NotAvailable("track metrics"))?;

        if artist.trim().is_empty() || title.trim().is_empty() {
            return Err(ProviderError::InvalidRequest(
                "artist and title are required".to_string(),
            ));
        }

        let mut attempt = 0u32;
        let response = loop {
            attempt += 1;

            if attempt > 1 {
                let backoff = self.retry.backoff(attempt);
                debug!(
                    artist,
                    title,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Rate limited, waiting before retry"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = self.rate_limiter.until_ready() => {}
            }

            let request = self
                .client
                .get(&self.endpoint)
                .query(&[("song", title), ("artist", artist)])
                .header("x-rapidapi-host", &self.host)
                .header("x-rapidapi-key", &credential.api_key)
                .send();

            let response = tokio::select! {
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                result = request => result?,
            };

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                break response;
            }

            if attempt >= self.retry.max_attempts {
                warn!(artist, title, attempts = attempt, "Giving up: still rate limited");
                return Err(ProviderError::RateLimited { attempts: attempt });
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(format!("'{}' by '{}'", title, artist)));
        }
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body: AnalysisResponse = tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            result = response.json() => result?,
        };

        debug!(
            artist,
            title,
            energy = body.energy,
            happiness = body.happiness,
            instrumentalness = body.instrumentalness,
            "Received track analysis"
        );

        Ok(TrackMetrics {
            energy_val: body.energy,
            happiness: body.happiness,
            instrumentalness: body.instrumentalness,
        })
    }
}

/// A file already has track data when all three metric tags are present
///
/// Names are compared exactly (lower-case); aliases do not count.
pub fn has_track_metrics(tags: &Tags) -> bool {
    let keys: Vec<&str> = tags.keys().collect();
    TRACK_METRIC_TAGS
        .iter()
        .all(|name| keys.contains(&name.to_lowercase().as_str()))
}

#[async_trait]
impl EnrichmentProvider for TrackMetricsProvider {
    fn name(&self) -> &'static str {
        "track metrics"
    }

    fn is_available(&self) -> bool {
        TrackMetricsProvider::is_available(self)
    }

    /// The upstream service rejects concurrent requests even with retries
    fn concurrency(&self) -> ConcurrencyPolicy {
        ConcurrencyPolicy::Sequential
    }

    fn already_enriched(&self, tags: &Tags) -> bool {
        has_track_metrics(tags)
    }

    async fn enrich(
        &self,
        file: &MediaFile,
        cancel: &CancellationToken,
    ) -> Result<Enrichment, ProviderError> {
        let metrics = self.fetch(&file.artist, &file.title, cancel).await?;

        info!(
            title = %file.title,
            artist = %file.artist,
            energy_val = metrics.energy_val,
            happiness = metrics.happiness,
            instrumentalness = metrics.instrumentalness,
            "Fetched track data"
        );

        let entries: Vec<(String, String)> = metrics
            .tag_entries()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();

        Ok(Enrichment {
            file_tags: entries.clone(),
            record_tags: entries,
            record_lyrics: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        let waits: Vec<u64> = (2..=policy.max_attempts)
            .map(|attempt| policy.backoff(attempt).as_secs())
            .collect();
        assert_eq!(waits, vec![2, 4, 8, 16, 32]);
    }

    #[test]
    fn test_skip_rule_needs_all_three_tags() {
        let tags: Tags = vec![("energyval", "80"), ("happiness", "40")]
            .into_iter()
            .collect();
        assert!(!has_track_metrics(&tags));

        let tags: Tags = vec![
            ("ENERGYVAL", "80"),
            ("happiness", "40"),
            ("instrumentalness", "0"),
        ]
        .into_iter()
        .collect();
        assert!(has_track_metrics(&tags));

        let tags: Tags = vec![("energy_val", "80"), ("happiness", "40"), ("instrumentalness", "0")]
            .into_iter()
            .collect();
        assert!(!has_track_metrics(&tags));
    }

    #[test]
    fn test_endpoint_host_extracted() {
        let provider = TrackMetricsProvider::new(
            None,
            "https://track-analysis.p.rapidapi.com/pktx/analysis",
            NonZeroU32::MIN,
            RetryPolicy::default(),
        )
        .unwrap();
        assert_eq!(provider.host, "track-analysis.p.rapidapi.com");
        assert!(!provider.is_available());
    }

    #[test]
    fn test_bad_endpoint_rejected() {
        assert!(TrackMetricsProvider::new(
            None,
            "not a url",
            NonZeroU32::MIN,
            RetryPolicy::default()
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_missing_title_rejected_before_request() {
        let provider = TrackMetricsProvider::new(
            Some(TrackMetricsCredential {
                api_key: "k".into(),
            }),
            "http://127.0.0.1:9/analysis",
            NonZeroU32::MIN,
            RetryPolicy::default(),
        )
        .unwrap();

        let result = provider.fetch("Artist", "", &CancellationToken::new()).await;
        assert!(matches!(result, Err(ProviderError::InvalidRequest(_))));
    }
}
