use axum::Json;
use axum::extract::State;

use crate::infra::registry::EngineMetadata;
use crate::state::AppState;

// ── GET /engines ──────────────────────────────────────────────────────────────

pub async fn list_engines(State(state): State<AppState>) -> Json<Vec<EngineMetadata>> {
    Json(state.engines)
}
