use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SyncError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormVersionProvision {
    pub form_version_id: Uuid,
    pub workspace_id: Uuid,
    pub form_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionProvision {
    pub submission_id: Uuid,
    pub workspace_id: Uuid,
    pub form_version_id: Uuid,
}

/// Opaque identifier the engine assigned to the provisioned object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineRef {
    pub engine_ref: String,
}

impl EngineRef {
    pub fn new(engine_ref: impl Into<String>) -> Self {
        Self {
            engine_ref: engine_ref.into(),
        }
    }
}

/// Downstream form engine.
///
/// Delivery is at-least-once: the same aggregate may be provisioned again
/// after a crash or a lost status write, so implementations must treat a
/// repeated call for an id they already know as success and return the
/// existing reference.
#[async_trait]
pub trait FormEngineAdapter: Send + Sync {
    async fn create_form_version_schema(
        &self,
        input: FormVersionProvision,
    ) -> anyhow::Result<EngineRef>;

    async fn create_submission_record(
        &self,
        input: SubmissionProvision,
    ) -> anyhow::Result<EngineRef>;
}

/// Maps an engine code to its installed adapter.
pub trait EngineAdapterResolver: Send + Sync {
    /// Fails with `EngineNotInstalled` for an unknown code.
    fn resolve(&self, engine_code: &str) -> Result<Arc<dyn FormEngineAdapter>, SyncError>;
}
