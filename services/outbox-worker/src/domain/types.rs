use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use soba_core::serde::to_rfc3339_ms_opt;
use soba_domain::aggregate::AggregateType;
use soba_domain::events::{EventPayload, PayloadError};
use soba_domain::outbox::OutboxStatus;
use soba_domain::sync_status::EngineSyncStatus;
use soba_domain::topic;

/// A claimed (or inspected) row of the outbox.
///
/// `aggregate_type` stays raw text: a kind this build does not know must
/// still be claimable so it can fail on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxRecord {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub topic: String,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub attempt_count: i32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// While `processing`, this is the lease stamp: every lease-guarded
    /// write matches on it.
    pub updated_at: DateTime<Utc>,
}

/// Event to append in the caller's transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOutboxEvent {
    pub topic: String,
    pub aggregate_type: AggregateType,
    pub aggregate_id: Uuid,
    pub workspace_id: Uuid,
    pub payload: serde_json::Value,
    pub actor_id: Option<Uuid>,
}

impl NewOutboxEvent {
    /// Encode `payload` and derive topic and aggregate from it.
    pub fn from_payload(
        workspace_id: Uuid,
        payload: &EventPayload,
        actor_id: Option<Uuid>,
    ) -> Result<Self, PayloadError> {
        let encoded = payload.encode()?;
        let aggregate_type = payload.aggregate_type();
        let engine_code = payload
            .engine_code()
            .ok_or(PayloadError::MissingEngineCode { aggregate_type })?;
        Ok(Self {
            topic: topic::create_topic(aggregate_type, engine_code),
            aggregate_type,
            aggregate_id: payload.aggregate_id(),
            workspace_id,
            payload: encoded,
            actor_id,
        })
    }

    /// Re-check the stored JSON against the codec before it is written.
    pub fn validate(&self) -> Result<(), PayloadError> {
        EventPayload::decode_for(self.aggregate_type, self.aggregate_id, &self.payload)?
            .encode()
            .map(|_| ())
    }
}

/// Backlog counters exposed on `/outbox/stats` and by `stats` on the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxStats {
    pub pending: u64,
    pub processing: u64,
    pub done: u64,
    /// Pending rows that already failed at least once.
    pub retrying: u64,
    /// Undelivered rows at or above `attempt_threshold`.
    pub over_threshold: u64,
    pub attempt_threshold: i32,
    #[serde(serialize_with = "to_rfc3339_ms_opt")]
    pub oldest_pending_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormVersionSummary {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub form_id: Uuid,
    pub engine_sync_status: EngineSyncStatus,
    pub engine_schema_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionSummary {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub form_id: Uuid,
    pub form_version_id: Uuid,
    pub engine_sync_status: EngineSyncStatus,
    pub engine_submission_ref: Option<String>,
}

/// Write applied to the owning entity's `engine_*` columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSyncUpdate {
    pub status: EngineSyncStatus,
    /// Left untouched when `None`.
    pub engine_ref: Option<String>,
    pub error: Option<String>,
}

impl EngineSyncUpdate {
    pub fn provisioning() -> Self {
        Self {
            status: EngineSyncStatus::Provisioning,
            engine_ref: None,
            error: None,
        }
    }

    pub fn ready(engine_ref: impl Into<String>) -> Self {
        Self {
            status: EngineSyncStatus::Ready,
            engine_ref: Some(engine_ref.into()),
            error: None,
        }
    }
}

/// Outcome of one worker iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub claimed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Records reclaimed by another worker before their outcome was written.
    pub lease_lost: usize,
}
