//! Suggested-energy analysis
//!
//! GET /api/song/:id/suggested-energy runs the audio feature extractor on
//! one song and returns the classification. Nothing is written.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::models::AnalysisResult;
use crate::AppState;

/// Suggested-energy response
#[derive(Debug, Serialize)]
pub struct SuggestedEnergyResponse {
    pub id: String,
    #[serde(flatten)]
    pub analysis: AnalysisResult,
}

/// GET /api/song/:id/suggested-energy
pub async fn suggested_energy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SuggestedEnergyResponse>> {
    if !state.audio_features.is_available() {
        return Err(ApiError::ServiceUnavailable(
            "Audio analyzer not available".to_string(),
        ));
    }

    let song = state.library.get(&id).await?;
    info!(id = %id, title = %song.title, "Analyzing song energy");

    let cancel = state.shutdown.child_token();
    let analysis = state
        .audio_features
        .analyze(&song.absolute_path(), &cancel)
        .await?;

    Ok(Json(SuggestedEnergyResponse { id, analysis }))
}

pub fn analysis_routes() -> Router<AppState> {
    Router::new().route("/api/song/:id/suggested-energy", get(suggested_energy))
}
