use axum::Json;
use axum::extract::State;

use crate::domain::repository::OutboxStore;
use crate::domain::types::OutboxStats;
use crate::error::SyncError;
use crate::state::AppState;

// ── GET /outbox/stats ─────────────────────────────────────────────────────────

pub async fn outbox_stats(State(state): State<AppState>) -> Result<Json<OutboxStats>, SyncError> {
    let stats = state
        .outbox_store()
        .stats(state.attempt_warn_threshold)
        .await?;
    Ok(Json(stats))
}
