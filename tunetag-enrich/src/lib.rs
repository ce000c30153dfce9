//! tunetag-enrich library interface
//!
//! Exposes the enrichment components and the HTTP router for integration
//! testing; `main.rs` only wires configuration, logging and the server.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod providers;
pub mod services;
pub mod tags;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::ServiceSettings;
use crate::db::{MediaFileStore, SqliteLibrary};
use crate::providers::{
    AudioFeatureProvider, Capabilities, LyricsProvider, ProviderError, TrackMetricsProvider,
};
use crate::services::{EnrichmentOrchestrator, TagMutationService};
use crate::tags::TagStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Library database pool
    pub db: SqlitePool,
    pub library: Arc<dyn MediaFileStore>,
    pub tag_store: TagStore,
    /// Startup probe result
    pub capabilities: Arc<Capabilities>,
    pub audio_features: Arc<AudioFeatureProvider>,
    pub lyrics: Arc<LyricsProvider>,
    pub track_metrics: Arc<TrackMetricsProvider>,
    pub orchestrator: EnrichmentOrchestrator,
    pub tag_mutation: TagMutationService,
    /// Root token; every request works on a child of it
    pub shutdown: CancellationToken,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        capabilities: Capabilities,
        settings: &ServiceSettings,
    ) -> Result<Self, ProviderError> {
        Self::with_tag_store(db, capabilities, settings, TagStore::default())
    }

    /// Same as `new` with a caller-chosen tag backend
    pub fn with_tag_store(
        db: SqlitePool,
        capabilities: Capabilities,
        settings: &ServiceSettings,
        tag_store: TagStore,
    ) -> Result<Self, ProviderError> {
        let library: Arc<dyn MediaFileStore> = Arc::new(SqliteLibrary::new(db.clone()));

        let audio_features = AudioFeatureProvider::new(
            capabilities.audio_analyzer.clone(),
            settings.analysis_timeout,
        );
        let lyrics = LyricsProvider::new(
            capabilities.lyrics.clone(),
            tag_store.clone(),
            settings.lyrics_parallelism,
        );
        let track_metrics = TrackMetricsProvider::new(
            capabilities.track_metrics.clone(),
            settings.track_analysis_url.clone(),
            settings.track_analysis_requests_per_second,
            settings.track_analysis_retry,
        )?;

        Ok(Self {
            db,
            orchestrator: EnrichmentOrchestrator::new(library.clone(), tag_store.clone()),
            tag_mutation: TagMutationService::new(library.clone(), tag_store.clone()),
            library,
            tag_store,
            capabilities: Arc::new(capabilities),
            audio_features: Arc::new(audio_features),
            lyrics: Arc::new(lyrics),
            track_metrics: Arc::new(track_metrics),
            shutdown: CancellationToken::new(),
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::song_tag_routes())
        .merge(api::analysis_routes())
        .merge(api::enrichment_routes())
        .merge(api::capability_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
