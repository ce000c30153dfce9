//! Energy and mood edits
//!
//! PUT /api/song/:id/energy and PUT /api/song/:id/mood with `{"value": ...}`.
//! An empty value clears the tag. Any body that is not `{"value": <string>}`
//! is a 400.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::put,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ApiResult;
use crate::services::TagField;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SetTagRequest {
    pub value: String,
}

async fn set_tag(
    state: &AppState,
    id: String,
    field: TagField,
    value: &str,
) -> ApiResult<Json<Value>> {
    state.tag_mutation.set_tag(&id, field, value).await?;

    let mut body = Map::new();
    body.insert("id".to_string(), Value::String(id));
    body.insert(field.key().to_string(), Value::String(value.to_string()));
    Ok(Json(Value::Object(body)))
}

/// PUT /api/song/:id/energy
pub async fn set_energy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Result<Json<SetTagRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = request?;
    set_tag(&state, id, TagField::Energy, &request.value).await
}

/// PUT /api/song/:id/mood
pub async fn set_mood(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Result<Json<SetTagRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = request?;
    set_tag(&state, id, TagField::Mood, &request.value).await
}

pub fn song_tag_routes() -> Router<AppState> {
    Router::new()
        .route("/api/song/:id/energy", put(set_energy))
        .route("/api/song/:id/mood", put(set_mood))
}
