#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::types::{
    EngineSyncUpdate, FormVersionSummary, NewOutboxEvent, OutboxRecord, OutboxStats,
    SubmissionSummary,
};
use crate::error::SyncError;

/// Durable queue of delivery records.
///
/// Appending happens through `infra::db::enqueue` inside the producer's own
/// transaction; this trait covers everything the worker does afterwards.
pub trait OutboxStore: Send + Sync {
    /// Lease up to `limit` due `pending` records, oldest first, flipping them
    /// to `processing`. Concurrent callers never receive the same record.
    async fn claim_batch(&self, limit: u64) -> Result<Vec<OutboxRecord>, SyncError>;

    /// Push the lease on a claimed record forward to now.
    ///
    /// `leased_at` is the record's `updated_at` as last seen by the caller.
    /// Returns the new stamp, or `None` once the record is no longer held
    /// under `leased_at` (reclaimed and possibly leased elsewhere).
    async fn renew_lease(
        &self,
        id: Uuid,
        leased_at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, SyncError>;

    /// `processing` → `done`, clearing `last_error`. Returns `false` without
    /// touching the row when the lease stamped `leased_at` was lost.
    async fn mark_succeeded(&self, id: Uuid, leased_at: DateTime<Utc>)
    -> Result<bool, SyncError>;

    /// `processing` → `pending` with `attempt_count_before + 1` attempts and
    /// the next attempt pushed out by the retry policy. Same lease guard as
    /// [`mark_succeeded`](Self::mark_succeeded).
    async fn mark_failed(
        &self,
        id: Uuid,
        leased_at: DateTime<Utc>,
        message: &str,
        attempt_count_before: i32,
    ) -> Result<bool, SyncError>;

    /// Return `processing` records last touched before `leased_before` to
    /// `pending`. Returns the number of records released.
    async fn reclaim_expired(&self, leased_before: DateTime<Utc>) -> Result<u64, SyncError>;

    /// Delete `done` records last touched before `before`.
    async fn purge_done(&self, before: DateTime<Utc>) -> Result<u64, SyncError>;

    async fn stats(&self, attempt_threshold: i32) -> Result<OutboxStats, SyncError>;
}

/// Read access to forms, for deriving the engine code of an aggregate.
pub trait FormRepository: Send + Sync {
    /// Code of the platform engine the form is pinned to.
    async fn engine_code_for_form(
        &self,
        workspace_id: Uuid,
        form_id: Uuid,
    ) -> Result<Option<String>, SyncError>;
}

pub trait FormVersionRepository: Send + Sync {
    async fn find_by_id(
        &self,
        workspace_id: Uuid,
        id: Uuid,
    ) -> Result<Option<FormVersionSummary>, SyncError>;

    /// Fails with `AggregateNotFound` when no row in the workspace matches.
    async fn update_sync_state(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        update: &EngineSyncUpdate,
    ) -> Result<(), SyncError>;

    /// Mark the version published and append `event`, atomically.
    async fn publish_with_outbox(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        actor_id: Uuid,
        event: &NewOutboxEvent,
    ) -> Result<(), SyncError>;
}

pub trait SubmissionRepository: Send + Sync {
    async fn find_by_id(
        &self,
        workspace_id: Uuid,
        id: Uuid,
    ) -> Result<Option<SubmissionSummary>, SyncError>;

    /// Fails with `AggregateNotFound` when no row in the workspace matches.
    async fn update_sync_state(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        update: &EngineSyncUpdate,
    ) -> Result<(), SyncError>;

    /// Mark the submission submitted and append `event`, atomically.
    async fn submit_with_outbox(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        actor_id: Uuid,
        event: &NewOutboxEvent,
    ) -> Result<(), SyncError>;
}
