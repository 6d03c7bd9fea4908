use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::infra::db::DbOutboxStore;
use crate::infra::registry::EngineMetadata;

/// Shared state for the ops router.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub attempt_warn_threshold: i32,
    pub actor_id: Option<Uuid>,
    /// Snapshot of the registry taken at startup.
    pub engines: Vec<EngineMetadata>,
}

impl AppState {
    pub fn outbox_store(&self) -> DbOutboxStore {
        DbOutboxStore {
            db: self.db.clone(),
            actor_id: self.actor_id,
        }
    }
}
