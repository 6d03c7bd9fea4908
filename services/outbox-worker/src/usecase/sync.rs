use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

use soba_domain::aggregate::AggregateType;
use soba_domain::events::{EventPayload, FormVersionCreatePayload, SubmissionCreatePayload};

use crate::domain::engine::{
    EngineAdapterResolver, EngineRef, FormVersionProvision, SubmissionProvision,
};
use crate::domain::repository::{FormRepository, FormVersionRepository, SubmissionRepository};
use crate::domain::types::{EngineSyncUpdate, OutboxRecord};
use crate::error::SyncError;
use crate::usecase::worker::OutboxProcessor;

/// Drives one claimed record to its form engine and mirrors the outcome
/// onto the owning form version or submission.
pub struct SyncEngine<F, V, S, R>
where
    F: FormRepository,
    V: FormVersionRepository,
    S: SubmissionRepository,
    R: EngineAdapterResolver,
{
    pub forms: F,
    pub form_versions: V,
    pub submissions: S,
    pub engines: R,
    pub adapter_timeout: Duration,
}

impl<F, V, S, R> SyncEngine<F, V, S, R>
where
    F: FormRepository,
    V: FormVersionRepository,
    S: SubmissionRepository,
    R: EngineAdapterResolver,
{
    /// Deliver `record`. Any error leaves the entity where it got to; the
    /// caller records the failure on the outbox row.
    pub async fn sync(&self, record: &OutboxRecord) -> Result<(), SyncError> {
        let aggregate_type: AggregateType = record.aggregate_type.parse()?;
        let payload =
            EventPayload::decode_for(aggregate_type, record.aggregate_id, &record.payload)?;
        let pinned = payload.engine_code().map(str::to_owned);
        match payload {
            EventPayload::FormVersionCreate(payload) => {
                self.sync_form_version(record.workspace_id, payload, pinned).await
            }
            EventPayload::SubmissionCreate(payload) => {
                self.sync_submission(record.workspace_id, payload, pinned).await
            }
        }
    }

    async fn sync_form_version(
        &self,
        workspace_id: Uuid,
        payload: FormVersionCreatePayload,
        pinned: Option<String>,
    ) -> Result<(), SyncError> {
        let id = payload.form_version_id;

        let (engine_code, form_id) = match (pinned, payload.form_id) {
            (Some(code), Some(form_id)) => (code, form_id),
            (pinned, form_id) => {
                let version = self
                    .form_versions
                    .find_by_id(workspace_id, id)
                    .await?
                    .ok_or(SyncError::AggregateNotFound {
                        aggregate_type: AggregateType::FormVersion,
                        aggregate_id: id,
                        workspace_id,
                    })?;
                let code = match pinned {
                    Some(code) => code,
                    None => {
                        self.engine_code_for_form(
                            workspace_id,
                            version.form_id,
                            AggregateType::FormVersion,
                            id,
                        )
                        .await?
                    }
                };
                (code, form_id.unwrap_or(version.form_id))
            }
        };

        let adapter = self.engines.resolve(&engine_code)?;
        self.form_versions
            .update_sync_state(workspace_id, id, &EngineSyncUpdate::provisioning())
            .await?;

        let engine_ref = self
            .call_engine(
                &engine_code,
                adapter.create_form_version_schema(FormVersionProvision {
                    form_version_id: id,
                    workspace_id,
                    form_id,
                }),
            )
            .await?;

        self.form_versions
            .update_sync_state(workspace_id, id, &EngineSyncUpdate::ready(engine_ref.engine_ref))
            .await?;
        tracing::debug!(engine_code = %engine_code, form_version_id = %id, "form version provisioned");
        Ok(())
    }

    async fn sync_submission(
        &self,
        workspace_id: Uuid,
        payload: SubmissionCreatePayload,
        pinned: Option<String>,
    ) -> Result<(), SyncError> {
        let id = payload.submission_id;

        let (engine_code, form_version_id) = match (pinned, payload.form_version_id) {
            (Some(code), Some(form_version_id)) => (code, form_version_id),
            (pinned, form_version_id) => {
                let submission = self
                    .submissions
                    .find_by_id(workspace_id, id)
                    .await?
                    .ok_or(SyncError::AggregateNotFound {
                        aggregate_type: AggregateType::Submission,
                        aggregate_id: id,
                        workspace_id,
                    })?;
                let code = match pinned {
                    Some(code) => code,
                    None => {
                        self.engine_code_for_form(
                            workspace_id,
                            submission.form_id,
                            AggregateType::Submission,
                            id,
                        )
                        .await?
                    }
                };
                (code, form_version_id.unwrap_or(submission.form_version_id))
            }
        };

        let adapter = self.engines.resolve(&engine_code)?;
        self.submissions
            .update_sync_state(workspace_id, id, &EngineSyncUpdate::provisioning())
            .await?;

        let engine_ref = self
            .call_engine(
                &engine_code,
                adapter.create_submission_record(SubmissionProvision {
                    submission_id: id,
                    workspace_id,
                    form_version_id,
                }),
            )
            .await?;

        self.submissions
            .update_sync_state(workspace_id, id, &EngineSyncUpdate::ready(engine_ref.engine_ref))
            .await?;
        tracing::debug!(engine_code = %engine_code, submission_id = %id, "submission provisioned");
        Ok(())
    }

    async fn engine_code_for_form(
        &self,
        workspace_id: Uuid,
        form_id: Uuid,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
    ) -> Result<String, SyncError> {
        self.forms
            .engine_code_for_form(workspace_id, form_id)
            .await?
            .filter(|code| !code.trim().is_empty())
            .ok_or(SyncError::EngineCodeUnresolved {
                aggregate_type,
                aggregate_id,
            })
    }

    async fn call_engine<Fut>(&self, engine_code: &str, call: Fut) -> Result<EngineRef, SyncError>
    where
        Fut: Future<Output = anyhow::Result<EngineRef>>,
    {
        match tokio::time::timeout(self.adapter_timeout, call).await {
            Ok(Ok(engine_ref)) => Ok(engine_ref),
            Ok(Err(cause)) => Err(SyncError::Engine {
                engine_code: engine_code.to_owned(),
                cause,
            }),
            Err(_) => Err(SyncError::EngineTimeout {
                engine_code: engine_code.to_owned(),
                timeout_ms: u64::try_from(self.adapter_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

impl<F, V, S, R> OutboxProcessor for SyncEngine<F, V, S, R>
where
    F: FormRepository,
    V: FormVersionRepository,
    S: SubmissionRepository,
    R: EngineAdapterResolver,
{
    async fn process(&self, record: &OutboxRecord) -> Result<(), SyncError> {
        self.sync(record).await
    }
}
