//! Batch enrichment over the members of an album or playlist
//!
//! Pre-flight checks (provider availability, resource lookup, empty
//! membership) abort the batch before any item is counted. After that every
//! member ends up fetched, skipped or failed, and no single item can abort
//! the rest.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::db::{MediaFileStore, ResourceKind};
use crate::models::{EnrichmentResult, ItemOutcome, Lyrics, MediaFile};
use crate::providers::{ConcurrencyPolicy, Enrichment, EnrichmentProvider, ProviderError};
use crate::tags::TagStore;

/// Batch-level failures (nothing was processed)
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("{0} provider not available")]
    NotAvailable(&'static str),

    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("No songs found in {kind} {id}")]
    Empty { kind: ResourceKind, id: String },

    #[error("Library error: {0}")]
    Library(tunetag_common::Error),
}

/// Drives one provider across the member files of a resource
#[derive(Clone)]
pub struct EnrichmentOrchestrator {
    library: Arc<dyn MediaFileStore>,
    tag_store: TagStore,
}

impl EnrichmentOrchestrator {
    pub fn new(library: Arc<dyn MediaFileStore>, tag_store: TagStore) -> Self {
        Self { library, tag_store }
    }

    /// Enrich every member of `kind`/`id` with `provider`
    pub async fn run(
        &self,
        provider: &dyn EnrichmentProvider,
        kind: ResourceKind,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<EnrichmentResult, OrchestratorError> {
        if !provider.is_available() {
            warn!(provider = provider.name(), "Provider not available");
            return Err(OrchestratorError::NotAvailable(provider.name()));
        }

        let files = match self.library.members(kind, id).await {
            Ok(files) => files,
            Err(tunetag_common::Error::NotFound(_)) => {
                return Err(OrchestratorError::NotFound {
                    kind,
                    id: id.to_string(),
                })
            }
            Err(e) => {
                error!(%kind, id, error = %e, "Failed to load members");
                return Err(OrchestratorError::Library(e));
            }
        };

        if files.is_empty() {
            return Err(OrchestratorError::Empty {
                kind,
                id: id.to_string(),
            });
        }

        let result = self.process_files(provider, files, cancel).await;

        info!(
            provider = provider.name(),
            resource_type = %kind,
            resource_id = id,
            total = result.total,
            fetched = result.fetched,
            failed = result.failed,
            skipped = result.skipped,
            "Finished enrichment batch"
        );

        Ok(result)
    }

    /// Process a caller-supplied batch; `total` is the batch size
    pub async fn process_files(
        &self,
        provider: &dyn EnrichmentProvider,
        files: Vec<MediaFile>,
        cancel: &CancellationToken,
    ) -> EnrichmentResult {
        let mut result = EnrichmentResult::new(files.len());

        match provider.concurrency() {
            ConcurrencyPolicy::Sequential => {
                for file in files {
                    result.record(self.process_one(provider, file, cancel).await);
                }
            }
            ConcurrencyPolicy::Parallel { max_in_flight } => {
                let outcomes: Vec<ItemOutcome> = stream::iter(files)
                    .map(|file| self.process_one(provider, file, cancel))
                    .buffer_unordered(max_in_flight.max(1))
                    .collect()
                    .await;
                for outcome in outcomes {
                    result.record(outcome);
                }
            }
        }

        debug_assert!(result.is_balanced());
        result
    }

    /// `Pending → (Skip | Fetch) → (Fetched | Failed)` for one file
    async fn process_one(
        &self,
        provider: &dyn EnrichmentProvider,
        mut file: MediaFile,
        cancel: &CancellationToken,
    ) -> ItemOutcome {
        let path = file.absolute_path();

        // An unreadable tag block means "not enriched yet"
        match self.tag_store.read_async(path.clone()).await {
            Ok(tags) if provider.already_enriched(&tags) => {
                debug!(
                    provider = provider.name(),
                    title = %file.title,
                    artist = %file.artist,
                    "Skipping already enriched file"
                );
                return ItemOutcome::Skipped;
            }
            Ok(_) => {}
            Err(e) => debug!(path = %path.display(), error = %e, "Could not read existing tags"),
        }

        info!(
            provider = provider.name(),
            title = %file.title,
            artist = %file.artist,
            "Fetching"
        );

        let enrichment = match provider.enrich(&file, cancel).await {
            Ok(enrichment) => enrichment,
            Err(e) => {
                log_fetch_failure(provider.name(), &file, &e);
                return ItemOutcome::Failed;
            }
        };

        for (name, value) in &enrichment.file_tags {
            if let Err(e) = self
                .tag_store
                .write_tag_async(path.clone(), name.clone(), value.clone())
                .await
            {
                error!(
                    path = %path.display(),
                    tag = %name,
                    error = %e,
                    "Failed to write tag"
                );
                return ItemOutcome::Failed;
            }
        }

        if let Err(e) = apply_to_record(&mut file, &enrichment) {
            error!(title = %file.title, error = %e, "Failed to prepare record");
            return ItemOutcome::Failed;
        }

        if let Err(e) = self.library.put(&file).await {
            error!(title = %file.title, error = %e, "Failed to save record");
            return ItemOutcome::Failed;
        }

        info!(
            provider = provider.name(),
            title = %file.title,
            artist = %file.artist,
            "Saved enrichment"
        );
        ItemOutcome::Fetched
    }
}

fn apply_to_record(file: &mut MediaFile, enrichment: &Enrichment) -> serde_json::Result<()> {
    for (name, value) in &enrichment.record_tags {
        file.tags.set_single(name, value);
    }
    if let Some(lyrics) = &enrichment.record_lyrics {
        file.lyrics = Lyrics::to_json_list(lyrics)?;
    }
    file.updated_at = chrono::Utc::now();
    Ok(())
}

fn log_fetch_failure(provider: &str, file: &MediaFile, err: &ProviderError) {
    match err {
        ProviderError::NotFound(_) => {
            debug!(provider, title = %file.title, artist = %file.artist, "Nothing found")
        }
        ProviderError::RateLimited { .. } => {
            warn!(provider, title = %file.title, artist = %file.artist, "Rate limited")
        }
        _ => error!(
            provider,
            title = %file.title,
            artist = %file.artist,
            error = %err,
            "Fetch failed"
        ),
    }
}
