//! Service settings for tunetag-enrich
//!
//! Turns the shared `TomlConfig` (plus environment credentials) into the
//! concrete values the providers are built from.

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};
pub use tunetag_common::config::{
    resolve_credential, TomlConfig, DEFAULT_TRACK_ANALYSIS_URL, GENIUS_TOKEN_ENV,
    RAPIDAPI_KEY_ENV,
};

use crate::providers::audio_features::DEFAULT_ANALYSIS_TIMEOUT;
use crate::providers::lyrics::DEFAULT_LYRICS_PARALLELISM;
use crate::providers::track_metrics::{RetryPolicy, DEFAULT_REQUESTS_PER_SECOND};
use crate::providers::ProbeSettings;

/// Resolved settings for the enrichment service
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub scripts_dir: Option<PathBuf>,
    pub genius_access_token: Option<String>,
    pub rapidapi_key: Option<String>,
    pub track_analysis_url: String,
    pub track_analysis_requests_per_second: NonZeroU32,
    pub track_analysis_retry: RetryPolicy,
    pub lyrics_parallelism: usize,
    pub analysis_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            scripts_dir: None,
            genius_access_token: None,
            rapidapi_key: None,
            track_analysis_url: DEFAULT_TRACK_ANALYSIS_URL.to_string(),
            track_analysis_requests_per_second: NonZeroU32::new(DEFAULT_REQUESTS_PER_SECOND)
                .unwrap_or(NonZeroU32::MIN),
            track_analysis_retry: RetryPolicy::default(),
            lyrics_parallelism: DEFAULT_LYRICS_PARALLELISM,
            analysis_timeout: DEFAULT_ANALYSIS_TIMEOUT,
        }
    }
}

impl ServiceSettings {
    /// Build from TOML; credentials prefer their environment variables
    pub fn from_toml(toml: &TomlConfig) -> Self {
        let defaults = Self::default();

        let genius_access_token =
            resolve_credential(GENIUS_TOKEN_ENV, toml.genius_access_token.as_deref());
        let rapidapi_key = resolve_credential(RAPIDAPI_KEY_ENV, toml.rapidapi_key.as_deref());

        info!(
            lyrics_token = genius_access_token.is_some(),
            track_analysis_key = rapidapi_key.is_some(),
            "Credentials resolved"
        );

        let track_analysis_requests_per_second = match toml.track_analysis_requests_per_second {
            Some(rate) => NonZeroU32::new(rate).unwrap_or_else(|| {
                warn!("track_analysis_requests_per_second must be at least 1, using 1");
                NonZeroU32::MIN
            }),
            None => defaults.track_analysis_requests_per_second,
        };

        Self {
            scripts_dir: toml.scripts_dir.clone(),
            genius_access_token,
            rapidapi_key,
            track_analysis_url: toml
                .track_analysis_url
                .clone()
                .unwrap_or(defaults.track_analysis_url),
            track_analysis_requests_per_second,
            track_analysis_retry: defaults.track_analysis_retry,
            lyrics_parallelism: toml
                .lyrics_parallelism
                .filter(|n| *n > 0)
                .unwrap_or(defaults.lyrics_parallelism),
            analysis_timeout: toml
                .analysis_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.analysis_timeout),
        }
    }

    /// Inputs for the one-time capability probe
    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            scripts_dir: self.scripts_dir.clone(),
            genius_access_token: self.genius_access_token.clone(),
            rapidapi_key: self.rapidapi_key.clone(),
        }
    }
}
