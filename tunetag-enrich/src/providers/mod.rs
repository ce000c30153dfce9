//! Enrichment providers
//!
//! Each provider supplies one kind of derived metadata. Providers that
//! enrich batch items implement `EnrichmentProvider`, which also carries the
//! skip rule and the concurrency the provider tolerates.

pub mod audio_features;
pub mod capabilities;
pub mod energy;
pub mod lyrics;
pub mod track_metrics;

pub use audio_features::{AnalysisError, AudioFeatureProvider};
pub use capabilities::{Capabilities, ProbeSettings};
pub use energy::classify;
pub use lyrics::LyricsProvider;
pub use track_metrics::{RetryPolicy, TrackMetricsProvider};

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::models::{Lyrics, MediaFile, Tags};

/// Provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider not configured or not installed
    #[error("{0} provider not available")]
    NotAvailable(&'static str),

    /// Upstream has nothing for this item
    #[error("Not found: {0}")]
    NotFound(String),

    /// Upstream kept answering 429
    #[error("Rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// Upstream answered with an unexpected status
    #[error("Upstream returned status {0}")]
    Status(u16),

    /// Request could not be built from the item
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Transport failure
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Caller cancelled the request
    #[error("Cancelled")]
    Cancelled,
}

/// How many items of one batch a provider may work on at once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyPolicy {
    /// Strictly one item after another
    Sequential,
    /// Up to `max_in_flight` items concurrently
    Parallel { max_in_flight: usize },
}

/// Changes produced for one file
///
/// The orchestrator writes `file_tags` to the audio file first, then folds
/// `record_tags` and `record_lyrics` into the library record and saves it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    /// Tags written to the audio file (name, value)
    pub file_tags: Vec<(String, String)>,
    /// Tags set on the library record (name, value)
    pub record_tags: Vec<(String, String)>,
    /// Replacement structured lyrics for the library record
    pub record_lyrics: Option<Vec<Lyrics>>,
}

/// A provider the batch orchestrator can drive
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    /// Short name for logs and errors
    fn name(&self) -> &'static str;

    /// Fixed at startup by the capability probe
    fn is_available(&self) -> bool;

    fn concurrency(&self) -> ConcurrencyPolicy;

    /// Skip rule: the file's existing tags already hold this enrichment
    fn already_enriched(&self, tags: &Tags) -> bool;

    /// Produce the enrichment for one file
    async fn enrich(
        &self,
        file: &MediaFile,
        cancel: &CancellationToken,
    ) -> Result<Enrichment, ProviderError>;
}
