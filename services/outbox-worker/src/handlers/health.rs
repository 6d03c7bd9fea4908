use axum::extract::State;
use axum::http::StatusCode;

use soba_core::health::database_readiness;

use crate::state::AppState;

// ── GET /readyz ───────────────────────────────────────────────────────────────

pub async fn readyz(State(state): State<AppState>) -> StatusCode {
    database_readiness(&state.db).await
}
