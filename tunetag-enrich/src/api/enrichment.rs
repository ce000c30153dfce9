//! Batch enrichment over albums and playlists
//!
//! Each call runs one provider over every member and answers with the
//! `{"total","fetched","failed","skipped"}` tally.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};

use crate::db::ResourceKind;
use crate::error::ApiResult;
use crate::models::EnrichmentResult;
use crate::providers::EnrichmentProvider;
use crate::AppState;

async fn run_batch(
    state: &AppState,
    provider: &dyn EnrichmentProvider,
    kind: ResourceKind,
    id: &str,
) -> ApiResult<Json<EnrichmentResult>> {
    let cancel = state.shutdown.child_token();
    let result = state.orchestrator.run(provider, kind, id, &cancel).await?;
    Ok(Json(result))
}

/// POST /api/album/:id/fetch-lyrics
pub async fn album_fetch_lyrics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EnrichmentResult>> {
    run_batch(&state, state.lyrics.as_ref(), ResourceKind::Album, &id).await
}

/// POST /api/playlist/:id/fetch-lyrics
pub async fn playlist_fetch_lyrics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EnrichmentResult>> {
    run_batch(&state, state.lyrics.as_ref(), ResourceKind::Playlist, &id).await
}

/// POST /api/album/:id/fetch-trackdata
pub async fn album_fetch_trackdata(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EnrichmentResult>> {
    run_batch(&state, state.track_metrics.as_ref(), ResourceKind::Album, &id).await
}

/// POST /api/playlist/:id/fetch-trackdata
pub async fn playlist_fetch_trackdata(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EnrichmentResult>> {
    run_batch(
        &state,
        state.track_metrics.as_ref(),
        ResourceKind::Playlist,
        &id,
    )
    .await
}

pub fn enrichment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/album/:id/fetch-lyrics", post(album_fetch_lyrics))
        .route("/api/playlist/:id/fetch-lyrics", post(playlist_fetch_lyrics))
        .route("/api/album/:id/fetch-trackdata", post(album_fetch_trackdata))
        .route(
            "/api/playlist/:id/fetch-trackdata",
            post(playlist_fetch_trackdata),
        )
}
