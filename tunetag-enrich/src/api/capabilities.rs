//! Capability report
//!
//! Lets a UI grey out actions whose provider was not found at startup.

use axum::{extract::State, routing::get, Json, Router};

use crate::providers::capabilities::CapabilitySummary;
use crate::AppState;

/// GET /api/capabilities
pub async fn get_capabilities(State(state): State<AppState>) -> Json<CapabilitySummary> {
    Json(state.capabilities.summary())
}

pub fn capability_routes() -> Router<AppState> {
    Router::new().route("/api/capabilities", get(get_capabilities))
}
