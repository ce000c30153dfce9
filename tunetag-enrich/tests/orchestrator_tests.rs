//! Batch orchestration tests with scripted providers

mod helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tunetag_common::{Error, Result};
use tunetag_enrich::db::{media_files, MediaFileStore, ResourceKind, SqliteLibrary};
use tunetag_enrich::models::{Lyrics, MediaFile, Tags};
use tunetag_enrich::providers::{
    ConcurrencyPolicy, Enrichment, EnrichmentProvider, ProviderError,
};
use tunetag_enrich::services::{EnrichmentOrchestrator, OrchestratorError};
use tunetag_enrich::tags::TagStore;

use helpers::{create_test_db, seed_album, seeded_at};

/// Tags every file with `MOCKTAG=done`; titles containing "fail" fail
struct MockProvider {
    available: bool,
    concurrency: ConcurrencyPolicy,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_seen: AtomicUsize,
}

impl MockProvider {
    fn new(concurrency: ConcurrencyPolicy) -> Self {
        Self {
            available: true,
            concurrency,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EnrichmentProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn concurrency(&self) -> ConcurrencyPolicy {
        self.concurrency
    }

    fn already_enriched(&self, tags: &Tags) -> bool {
        tags.contains_key("mocktag")
    }

    async fn enrich(
        &self,
        file: &MediaFile,
        _cancel: &CancellationToken,
    ) -> std::result::Result<Enrichment, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if file.title.contains("fail") {
            return Err(ProviderError::NotFound(file.title.clone()));
        }

        Ok(Enrichment {
            file_tags: vec![("MOCKTAG".to_string(), "done".to_string())],
            record_tags: vec![("mocktag".to_string(), "done".to_string())],
            record_lyrics: Some(vec![Lyrics::parse("xxx", "la la").unwrap()]),
        })
    }
}

/// Library whose `put` fails for one id
struct FailingPutLibrary {
    inner: SqliteLibrary,
    fail_id: String,
}

#[async_trait]
impl MediaFileStore for FailingPutLibrary {
    async fn get(&self, id: &str) -> Result<MediaFile> {
        self.inner.get(id).await
    }

    async fn put(&self, file: &MediaFile) -> Result<()> {
        if file.id == self.fail_id {
            return Err(Error::Internal("disk full".to_string()));
        }
        self.inner.put(file).await
    }

    async fn members(&self, kind: ResourceKind, id: &str) -> Result<Vec<MediaFile>> {
        self.inner.members(kind, id).await
    }
}

fn orchestrator(library: impl MediaFileStore + 'static) -> EnrichmentOrchestrator {
    EnrichmentOrchestrator::new(Arc::new(library), TagStore::default())
}

#[tokio::test]
async fn test_batch_counts_balance() {
    let (dir, pool) = create_test_db().await;
    let files = seed_album(&pool, dir.path(), "al-1", &["a", "b", "fail-c", "d"]).await;
    TagStore::default()
        .write_tag(&files[3].absolute_path(), "MOCKTAG", "old")
        .unwrap();

    let provider = MockProvider::new(ConcurrencyPolicy::Sequential);
    let result = orchestrator(SqliteLibrary::new(pool.clone()))
        .run(&provider, ResourceKind::Album, "al-1", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.total, 4);
    assert_eq!(result.fetched, 2);
    assert_eq!(result.failed, 1);
    assert_eq!(result.skipped, 1);
    assert!(result.is_balanced());
    // The skipped file never reached the provider
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);

    let record = media_files::get_media_file(&pool, "a").await.unwrap().unwrap();
    assert_eq!(record.tags.first("mocktag"), Some("done"));
    assert!(record.lyrics.contains("\"lang\":\"xxx\""));
    assert!(record.updated_at > seeded_at());

    let on_disk = TagStore::default().read(&files[0].absolute_path()).unwrap();
    assert_eq!(on_disk.first("mocktag"), Some("done"));

    let failed = media_files::get_media_file(&pool, "fail-c").await.unwrap().unwrap();
    assert_eq!(failed.updated_at, seeded_at());
}

#[tokio::test]
async fn test_save_failure_counts_as_failed_and_batch_continues() {
    let (dir, pool) = create_test_db().await;
    seed_album(&pool, dir.path(), "al-1", &["a", "b", "c"]).await;

    let library = FailingPutLibrary {
        inner: SqliteLibrary::new(pool.clone()),
        fail_id: "b".to_string(),
    };
    let provider = MockProvider::new(ConcurrencyPolicy::Sequential);
    let result = orchestrator(library)
        .run(&provider, ResourceKind::Album, "al-1", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!((result.fetched, result.failed, result.skipped), (2, 1, 0));
    let c = media_files::get_media_file(&pool, "c").await.unwrap().unwrap();
    assert_eq!(c.tags.first("mocktag"), Some("done"));
}

#[tokio::test]
async fn test_unreadable_file_is_not_skipped() {
    let (dir, pool) = create_test_db().await;
    let files = seed_album(&pool, dir.path(), "al-1", &["gone"]).await;
    std::fs::remove_file(files[0].absolute_path()).unwrap();

    let provider = MockProvider::new(ConcurrencyPolicy::Sequential);
    let result = orchestrator(SqliteLibrary::new(pool))
        .run(&provider, ResourceKind::Album, "al-1", &CancellationToken::new())
        .await
        .unwrap();

    // Read failure means "not enriched"; the write then fails
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert_eq!((result.total, result.failed), (1, 1));
}

#[tokio::test]
async fn test_parallel_policy_bounds_in_flight() {
    let (dir, pool) = create_test_db().await;
    let ids: Vec<String> = (0..8).map(|n| format!("s{}", n)).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    seed_album(&pool, dir.path(), "al-1", &id_refs).await;

    let provider = MockProvider::new(ConcurrencyPolicy::Parallel { max_in_flight: 3 });
    let result = orchestrator(SqliteLibrary::new(pool))
        .run(&provider, ResourceKind::Album, "al-1", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.fetched, 8);
    let max_seen = provider.max_seen.load(Ordering::SeqCst);
    assert!(max_seen <= 3, "saw {} in flight", max_seen);
    assert!(max_seen > 1);
}

#[tokio::test]
async fn test_sequential_policy_one_at_a_time() {
    let (dir, pool) = create_test_db().await;
    seed_album(&pool, dir.path(), "al-1", &["a", "b", "c", "d"]).await;

    let provider = MockProvider::new(ConcurrencyPolicy::Sequential);
    orchestrator(SqliteLibrary::new(pool))
        .run(&provider, ResourceKind::Album, "al-1", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(provider.max_seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_playlist_members() {
    let (dir, pool) = create_test_db().await;
    seed_album(&pool, dir.path(), "al-1", &["a", "b", "c"]).await;
    media_files::insert_playlist(&pool, "pl-1", "Mix", &["c", "a"])
        .await
        .unwrap();

    let provider = MockProvider::new(ConcurrencyPolicy::Sequential);
    let result = orchestrator(SqliteLibrary::new(pool.clone()))
        .run(&provider, ResourceKind::Playlist, "pl-1", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!((result.total, result.fetched), (2, 2));
    let b = media_files::get_media_file(&pool, "b").await.unwrap().unwrap();
    assert!(!b.tags.contains_key("mocktag"));
}

#[tokio::test]
async fn test_preflight_failures() {
    let (dir, pool) = create_test_db().await;
    seed_album(&pool, dir.path(), "al-1", &["a"]).await;
    media_files::insert_album(&pool, "al-empty", "Empty").await.unwrap();
    let orchestrator = orchestrator(SqliteLibrary::new(pool));
    let cancel = CancellationToken::new();

    let mut unavailable = MockProvider::new(ConcurrencyPolicy::Sequential);
    unavailable.available = false;
    let err = orchestrator
        .run(&unavailable, ResourceKind::Album, "al-1", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NotAvailable("mock")));

    let provider = MockProvider::new(ConcurrencyPolicy::Sequential);
    let err = orchestrator
        .run(&provider, ResourceKind::Album, "nope", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound { .. }));

    let err = orchestrator
        .run(&provider, ResourceKind::Album, "al-empty", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Empty { .. }));

    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}
