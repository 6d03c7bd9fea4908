use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, LockBehavior, LockType};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionError, TransactionTrait,
};
use uuid::Uuid;

use soba_domain::aggregate::AggregateType;
use soba_domain::outbox::{self, OutboxStatus};
use soba_domain::sync_status::EngineSyncStatus;
use soba_outbox_schema::{form, form_version, integration_outbox, platform_form_engine, submission};

use crate::domain::repository::{
    FormRepository, FormVersionRepository, OutboxStore, SubmissionRepository,
};
use crate::domain::types::{
    EngineSyncUpdate, FormVersionSummary, NewOutboxEvent, OutboxRecord, OutboxStats,
    SubmissionSummary,
};
use crate::error::SyncError;

const LEASE_EXPIRED: &str = "lease expired";

// ── Error classification ──────────────────────────────────────────────────────

fn classify(err: DbErr, context: &'static str) -> SyncError {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => {
            SyncError::StoreUnavailable(anyhow::Error::new(err).context(context))
        }
        other => SyncError::Internal(anyhow::Error::new(other).context(context)),
    }
}

fn store_err(context: &'static str) -> impl FnOnce(DbErr) -> SyncError {
    move |err| classify(err, context)
}

fn transaction_err(err: TransactionError<DbErr>, context: &'static str) -> SyncError {
    match err {
        TransactionError::Connection(e) | TransactionError::Transaction(e) => classify(e, context),
    }
}

// ── Enqueue ───────────────────────────────────────────────────────────────────

/// Append one `pending` record through `conn`.
///
/// Pass the producer's open transaction so the record commits or rolls back
/// together with the business write.
pub async fn enqueue<C>(conn: &C, event: &NewOutboxEvent) -> Result<Uuid, DbErr>
where
    C: ConnectionTrait,
{
    event
        .validate()
        .map_err(|e| DbErr::Custom(e.to_string()))?;

    let now = Utc::now();
    let id = Uuid::now_v7();
    integration_outbox::ActiveModel {
        id: Set(id),
        workspace_id: Set(event.workspace_id),
        topic: Set(event.topic.clone()),
        aggregate_type: Set(event.aggregate_type.as_str().to_owned()),
        aggregate_id: Set(event.aggregate_id),
        payload: Set(event.payload.clone()),
        status: Set(OutboxStatus::Pending.as_str().to_owned()),
        attempt_count: Set(0),
        next_attempt_at: Set(None),
        last_error: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        created_by: Set(event.actor_id),
        updated_by: Set(event.actor_id),
    }
    .insert(conn)
    .await?;
    Ok(id)
}

// ── Outbox store ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbOutboxStore {
    pub db: DatabaseConnection,
    /// Stamped into `updated_by` when set.
    pub actor_id: Option<Uuid>,
}

impl OutboxStore for DbOutboxStore {
    async fn claim_batch(&self, limit: u64) -> Result<Vec<OutboxRecord>, SyncError> {
        let actor_id = self.actor_id;
        let models = self
            .db
            .transaction::<_, Vec<integration_outbox::Model>, DbErr>(|txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let ids: Vec<Uuid> = integration_outbox::Entity::find()
                        .select_only()
                        .column(integration_outbox::Column::Id)
                        .filter(
                            integration_outbox::Column::Status.eq(OutboxStatus::Pending.as_str()),
                        )
                        .filter(
                            Condition::any()
                                .add(integration_outbox::Column::NextAttemptAt.is_null())
                                .add(integration_outbox::Column::NextAttemptAt.lte(now)),
                        )
                        .order_by_asc(integration_outbox::Column::CreatedAt)
                        .limit(limit)
                        .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
                        .into_tuple()
                        .all(txn)
                        .await?;
                    if ids.is_empty() {
                        return Ok(Vec::new());
                    }

                    let mut update = integration_outbox::Entity::update_many()
                        .col_expr(
                            integration_outbox::Column::Status,
                            Expr::value(OutboxStatus::Processing.as_str()),
                        )
                        .col_expr(integration_outbox::Column::UpdatedAt, Expr::value(now));
                    if let Some(actor_id) = actor_id {
                        update = update
                            .col_expr(integration_outbox::Column::UpdatedBy, Expr::value(actor_id));
                    }
                    let mut models = update
                        .filter(integration_outbox::Column::Id.is_in(ids))
                        .filter(
                            integration_outbox::Column::Status.eq(OutboxStatus::Pending.as_str()),
                        )
                        .exec_with_returning(txn)
                        .await?;
                    models.sort_by_key(|m| m.created_at);
                    Ok(models)
                })
            })
            .await
            .map_err(|e| transaction_err(e, "claim outbox batch"))?;

        models.into_iter().map(record_from_model).collect()
    }

    async fn renew_lease(
        &self,
        id: Uuid,
        leased_at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, SyncError> {
        let mut update = integration_outbox::Entity::update_many()
            .col_expr(integration_outbox::Column::UpdatedAt, Expr::value(Utc::now()));
        if let Some(actor_id) = self.actor_id {
            update = update.col_expr(integration_outbox::Column::UpdatedBy, Expr::value(actor_id));
        }
        let renewed = update
            .filter(lease_held(id, leased_at))
            .exec_with_returning(&self.db)
            .await
            .map_err(store_err("renew outbox lease"))?;
        Ok(renewed.first().map(|m| m.updated_at))
    }

    async fn mark_succeeded(&self, id: Uuid, leased_at: DateTime<Utc>) -> Result<bool, SyncError> {
        let mut update = integration_outbox::Entity::update_many()
            .col_expr(
                integration_outbox::Column::Status,
                Expr::value(OutboxStatus::Done.as_str()),
            )
            .col_expr(
                integration_outbox::Column::LastError,
                Expr::value(Option::<String>::None),
            )
            .col_expr(integration_outbox::Column::UpdatedAt, Expr::value(Utc::now()));
        if let Some(actor_id) = self.actor_id {
            update = update.col_expr(integration_outbox::Column::UpdatedBy, Expr::value(actor_id));
        }
        let result = update
            .filter(lease_held(id, leased_at))
            .exec(&self.db)
            .await
            .map_err(store_err("mark outbox record succeeded"))?;
        Ok(result.rows_affected > 0)
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        leased_at: DateTime<Utc>,
        message: &str,
        attempt_count_before: i32,
    ) -> Result<bool, SyncError> {
        let now = Utc::now();
        let mut update = integration_outbox::Entity::update_many()
            .col_expr(
                integration_outbox::Column::Status,
                Expr::value(OutboxStatus::Pending.as_str()),
            )
            .col_expr(
                integration_outbox::Column::AttemptCount,
                Expr::value(attempt_count_before.saturating_add(1)),
            )
            .col_expr(
                integration_outbox::Column::NextAttemptAt,
                Expr::value(outbox::next_attempt_at(now, attempt_count_before)),
            )
            .col_expr(
                integration_outbox::Column::LastError,
                Expr::value(outbox::truncate_error(message)),
            )
            .col_expr(integration_outbox::Column::UpdatedAt, Expr::value(now));
        if let Some(actor_id) = self.actor_id {
            update = update.col_expr(integration_outbox::Column::UpdatedBy, Expr::value(actor_id));
        }
        let result = update
            .filter(lease_held(id, leased_at))
            .exec(&self.db)
            .await
            .map_err(store_err("mark outbox record failed"))?;
        Ok(result.rows_affected > 0)
    }

    async fn reclaim_expired(&self, leased_before: DateTime<Utc>) -> Result<u64, SyncError> {
        let mut update = integration_outbox::Entity::update_many()
            .col_expr(
                integration_outbox::Column::Status,
                Expr::value(OutboxStatus::Pending.as_str()),
            )
            .col_expr(integration_outbox::Column::LastError, Expr::value(LEASE_EXPIRED))
            .col_expr(integration_outbox::Column::UpdatedAt, Expr::value(Utc::now()));
        if let Some(actor_id) = self.actor_id {
            update = update.col_expr(integration_outbox::Column::UpdatedBy, Expr::value(actor_id));
        }
        let result = update
            .filter(integration_outbox::Column::Status.eq(OutboxStatus::Processing.as_str()))
            .filter(integration_outbox::Column::UpdatedAt.lt(leased_before))
            .exec(&self.db)
            .await
            .map_err(store_err("reclaim expired outbox leases"))?;
        Ok(result.rows_affected)
    }

    async fn purge_done(&self, before: DateTime<Utc>) -> Result<u64, SyncError> {
        let result = integration_outbox::Entity::delete_many()
            .filter(integration_outbox::Column::Status.eq(OutboxStatus::Done.as_str()))
            .filter(integration_outbox::Column::UpdatedAt.lt(before))
            .exec(&self.db)
            .await
            .map_err(store_err("purge done outbox records"))?;
        Ok(result.rows_affected)
    }

    async fn stats(&self, attempt_threshold: i32) -> Result<OutboxStats, SyncError> {
        let by_status: Vec<(String, i64)> = integration_outbox::Entity::find()
            .select_only()
            .column(integration_outbox::Column::Status)
            .column_as(integration_outbox::Column::Id.count(), "count")
            .group_by(integration_outbox::Column::Status)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(store_err("count outbox records by status"))?;

        let retrying = integration_outbox::Entity::find()
            .filter(integration_outbox::Column::Status.eq(OutboxStatus::Pending.as_str()))
            .filter(integration_outbox::Column::AttemptCount.gt(0))
            .count(&self.db)
            .await
            .map_err(store_err("count retrying outbox records"))?;

        let over_threshold = integration_outbox::Entity::find()
            .filter(integration_outbox::Column::Status.ne(OutboxStatus::Done.as_str()))
            .filter(integration_outbox::Column::AttemptCount.gte(attempt_threshold))
            .count(&self.db)
            .await
            .map_err(store_err("count outbox records over attempt threshold"))?;

        let oldest_pending_at: Option<DateTime<Utc>> = integration_outbox::Entity::find()
            .select_only()
            .column(integration_outbox::Column::CreatedAt)
            .filter(integration_outbox::Column::Status.eq(OutboxStatus::Pending.as_str()))
            .order_by_asc(integration_outbox::Column::CreatedAt)
            .into_tuple()
            .one(&self.db)
            .await
            .map_err(store_err("find oldest pending outbox record"))?;

        let mut stats = OutboxStats {
            retrying,
            over_threshold,
            attempt_threshold,
            oldest_pending_at,
            ..Default::default()
        };
        for (status, count) in by_status {
            let count = u64::try_from(count).unwrap_or_default();
            match status.parse::<OutboxStatus>() {
                Ok(OutboxStatus::Pending) => stats.pending = count,
                Ok(OutboxStatus::Processing) => stats.processing = count,
                Ok(OutboxStatus::Done) => stats.done = count,
                Err(e) => tracing::warn!(error = %e, count, "outbox rows with unknown status"),
            }
        }
        Ok(stats)
    }
}

/// Row `id` is still `processing` under the lease stamped `leased_at`.
fn lease_held(id: Uuid, leased_at: DateTime<Utc>) -> Condition {
    Condition::all()
        .add(integration_outbox::Column::Id.eq(id))
        .add(integration_outbox::Column::Status.eq(OutboxStatus::Processing.as_str()))
        .add(integration_outbox::Column::UpdatedAt.eq(leased_at))
}

fn record_from_model(model: integration_outbox::Model) -> Result<OutboxRecord, SyncError> {
    let status = model
        .status
        .parse::<OutboxStatus>()
        .with_context(|| format!("outbox record {}", model.id))?;
    Ok(OutboxRecord {
        id: model.id,
        workspace_id: model.workspace_id,
        topic: model.topic,
        aggregate_type: model.aggregate_type,
        aggregate_id: model.aggregate_id,
        payload: model.payload,
        status,
        attempt_count: model.attempt_count,
        next_attempt_at: model.next_attempt_at,
        last_error: model.last_error,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn sync_status(raw: &str, id: Uuid) -> Result<EngineSyncStatus, SyncError> {
    let status = raw
        .parse::<EngineSyncStatus>()
        .with_context(|| format!("engine sync status of {id}"))?;
    Ok(status)
}

// ── Form repository ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbFormRepository {
    pub db: DatabaseConnection,
}

impl FormRepository for DbFormRepository {
    async fn engine_code_for_form(
        &self,
        workspace_id: Uuid,
        form_id: Uuid,
    ) -> Result<Option<String>, SyncError> {
        let found = form::Entity::find_by_id(form_id)
            .filter(form::Column::WorkspaceId.eq(workspace_id))
            .find_also_related(platform_form_engine::Entity)
            .one(&self.db)
            .await
            .map_err(store_err("find form engine"))?;
        Ok(found.and_then(|(_, engine)| engine).map(|engine| engine.code))
    }
}

// ── Form version repository ───────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbFormVersionRepository {
    pub db: DatabaseConnection,
    pub actor_id: Option<Uuid>,
}

impl FormVersionRepository for DbFormVersionRepository {
    async fn find_by_id(
        &self,
        workspace_id: Uuid,
        id: Uuid,
    ) -> Result<Option<FormVersionSummary>, SyncError> {
        let model = form_version::Entity::find_by_id(id)
            .filter(form_version::Column::WorkspaceId.eq(workspace_id))
            .one(&self.db)
            .await
            .map_err(store_err("find form version"))?;
        model
            .map(|m| {
                Ok(FormVersionSummary {
                    engine_sync_status: sync_status(&m.engine_sync_status, m.id)?,
                    id: m.id,
                    workspace_id: m.workspace_id,
                    form_id: m.form_id,
                    engine_schema_ref: m.engine_schema_ref,
                })
            })
            .transpose()
    }

    async fn update_sync_state(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        update: &EngineSyncUpdate,
    ) -> Result<(), SyncError> {
        let mut query = form_version::Entity::update_many()
            .col_expr(
                form_version::Column::EngineSyncStatus,
                Expr::value(update.status.as_str()),
            )
            .col_expr(
                form_version::Column::EngineSyncError,
                Expr::value(update.error.clone()),
            )
            .col_expr(form_version::Column::UpdatedAt, Expr::value(Utc::now()));
        if let Some(engine_ref) = &update.engine_ref {
            query = query.col_expr(
                form_version::Column::EngineSchemaRef,
                Expr::value(engine_ref.clone()),
            );
        }
        if let Some(actor_id) = self.actor_id {
            query = query.col_expr(form_version::Column::UpdatedBy, Expr::value(actor_id));
        }
        let result = query
            .filter(form_version::Column::Id.eq(id))
            .filter(form_version::Column::WorkspaceId.eq(workspace_id))
            .exec(&self.db)
            .await
            .map_err(store_err("update form version sync state"))?;
        if result.rows_affected == 0 {
            return Err(SyncError::AggregateNotFound {
                aggregate_type: AggregateType::FormVersion,
                aggregate_id: id,
                workspace_id,
            });
        }
        Ok(())
    }

    async fn publish_with_outbox(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        actor_id: Uuid,
        event: &NewOutboxEvent,
    ) -> Result<(), SyncError> {
        let event = event.clone();
        self.db
            .transaction::<_, (), DbErr>(|txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let result = form_version::Entity::update_many()
                        .col_expr(form_version::Column::State, Expr::value("published"))
                        .col_expr(form_version::Column::PublishedAt, Expr::value(now))
                        .col_expr(form_version::Column::PublishedBy, Expr::value(actor_id))
                        .col_expr(
                            form_version::Column::EngineSyncStatus,
                            Expr::value(EngineSyncStatus::Pending.as_str()),
                        )
                        .col_expr(
                            form_version::Column::EngineSyncError,
                            Expr::value(Option::<String>::None),
                        )
                        .col_expr(form_version::Column::UpdatedAt, Expr::value(now))
                        .col_expr(form_version::Column::UpdatedBy, Expr::value(actor_id))
                        .filter(form_version::Column::Id.eq(id))
                        .filter(form_version::Column::WorkspaceId.eq(workspace_id))
                        .filter(form_version::Column::DeletedAt.is_null())
                        .exec(txn)
                        .await?;
                    if result.rows_affected == 0 {
                        return Err(DbErr::RecordNotUpdated);
                    }
                    enqueue(txn, &event).await?;
                    Ok(())
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Transaction(DbErr::RecordNotUpdated) => {
                    SyncError::AggregateNotFound {
                        aggregate_type: AggregateType::FormVersion,
                        aggregate_id: id,
                        workspace_id,
                    }
                }
                other => transaction_err(other, "publish form version with outbox"),
            })
    }
}

// ── Submission repository ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbSubmissionRepository {
    pub db: DatabaseConnection,
    pub actor_id: Option<Uuid>,
}

impl SubmissionRepository for DbSubmissionRepository {
    async fn find_by_id(
        &self,
        workspace_id: Uuid,
        id: Uuid,
    ) -> Result<Option<SubmissionSummary>, SyncError> {
        let model = submission::Entity::find_by_id(id)
            .filter(submission::Column::WorkspaceId.eq(workspace_id))
            .one(&self.db)
            .await
            .map_err(store_err("find submission"))?;
        model
            .map(|m| {
                Ok(SubmissionSummary {
                    engine_sync_status: sync_status(&m.engine_sync_status, m.id)?,
                    id: m.id,
                    workspace_id: m.workspace_id,
                    form_id: m.form_id,
                    form_version_id: m.form_version_id,
                    engine_submission_ref: m.engine_submission_ref,
                })
            })
            .transpose()
    }

    async fn update_sync_state(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        update: &EngineSyncUpdate,
    ) -> Result<(), SyncError> {
        let mut query = submission::Entity::update_many()
            .col_expr(
                submission::Column::EngineSyncStatus,
                Expr::value(update.status.as_str()),
            )
            .col_expr(
                submission::Column::EngineSyncError,
                Expr::value(update.error.clone()),
            )
            .col_expr(submission::Column::UpdatedAt, Expr::value(Utc::now()));
        if let Some(engine_ref) = &update.engine_ref {
            query = query.col_expr(
                submission::Column::EngineSubmissionRef,
                Expr::value(engine_ref.clone()),
            );
        }
        if let Some(actor_id) = self.actor_id {
            query = query.col_expr(submission::Column::UpdatedBy, Expr::value(actor_id));
        }
        let result = query
            .filter(submission::Column::Id.eq(id))
            .filter(submission::Column::WorkspaceId.eq(workspace_id))
            .exec(&self.db)
            .await
            .map_err(store_err("update submission sync state"))?;
        if result.rows_affected == 0 {
            return Err(SyncError::AggregateNotFound {
                aggregate_type: AggregateType::Submission,
                aggregate_id: id,
                workspace_id,
            });
        }
        Ok(())
    }

    async fn submit_with_outbox(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        actor_id: Uuid,
        event: &NewOutboxEvent,
    ) -> Result<(), SyncError> {
        let event = event.clone();
        self.db
            .transaction::<_, (), DbErr>(|txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let result = submission::Entity::update_many()
                        .col_expr(submission::Column::WorkflowState, Expr::value("submitted"))
                        .col_expr(submission::Column::SubmittedAt, Expr::value(now))
                        .col_expr(submission::Column::SubmittedBy, Expr::value(actor_id))
                        .col_expr(
                            submission::Column::EngineSyncStatus,
                            Expr::value(EngineSyncStatus::Pending.as_str()),
                        )
                        .col_expr(
                            submission::Column::EngineSyncError,
                            Expr::value(Option::<String>::None),
                        )
                        .col_expr(submission::Column::UpdatedAt, Expr::value(now))
                        .col_expr(submission::Column::UpdatedBy, Expr::value(actor_id))
                        .filter(submission::Column::Id.eq(id))
                        .filter(submission::Column::WorkspaceId.eq(workspace_id))
                        .filter(submission::Column::DeletedAt.is_null())
                        .exec(txn)
                        .await?;
                    if result.rows_affected == 0 {
                        return Err(DbErr::RecordNotUpdated);
                    }
                    enqueue(txn, &event).await?;
                    Ok(())
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Transaction(DbErr::RecordNotUpdated) => {
                    SyncError::AggregateNotFound {
                        aggregate_type: AggregateType::Submission,
                        aggregate_id: id,
                        workspace_id,
                    }
                }
                other => transaction_err(other, "submit submission with outbox"),
            })
    }
}
