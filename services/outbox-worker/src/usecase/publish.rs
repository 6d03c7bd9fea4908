//! Producers: business writes that enqueue an outbox record in the same
//! transaction.

use uuid::Uuid;

use soba_domain::aggregate::AggregateType;
use soba_domain::events::EventPayload;

use crate::domain::repository::{FormRepository, FormVersionRepository, SubmissionRepository};
use crate::domain::types::NewOutboxEvent;
use crate::error::SyncError;

pub struct PublishFormVersionInput {
    pub workspace_id: Uuid,
    pub form_version_id: Uuid,
    pub actor_id: Uuid,
}

pub struct PublishFormVersionUseCase<F, V>
where
    F: FormRepository,
    V: FormVersionRepository,
{
    pub forms: F,
    pub form_versions: V,
}

impl<F, V> PublishFormVersionUseCase<F, V>
where
    F: FormRepository,
    V: FormVersionRepository,
{
    /// Returns the event that was enqueued.
    pub async fn execute(
        &self,
        input: PublishFormVersionInput,
    ) -> Result<NewOutboxEvent, SyncError> {
        let PublishFormVersionInput {
            workspace_id,
            form_version_id,
            actor_id,
        } = input;

        // 1. Load the version → 404 if not in this workspace
        let version = self
            .form_versions
            .find_by_id(workspace_id, form_version_id)
            .await?
            .ok_or(SyncError::AggregateNotFound {
                aggregate_type: AggregateType::FormVersion,
                aggregate_id: form_version_id,
                workspace_id,
            })?;

        // 2. Pin the engine the form belongs to
        let engine_code = self
            .forms
            .engine_code_for_form(workspace_id, version.form_id)
            .await?
            .ok_or(SyncError::EngineCodeUnresolved {
                aggregate_type: AggregateType::FormVersion,
                aggregate_id: form_version_id,
            })?;

        // 3. State change + outbox record in one transaction
        let payload =
            EventPayload::form_version_create(form_version_id, engine_code, Some(version.form_id));
        let event = NewOutboxEvent::from_payload(workspace_id, &payload, Some(actor_id))?;
        self.form_versions
            .publish_with_outbox(workspace_id, form_version_id, actor_id, &event)
            .await?;

        tracing::info!(
            topic = %event.topic,
            form_version_id = %form_version_id,
            workspace_id = %workspace_id,
            "form version published"
        );
        Ok(event)
    }
}

pub struct SubmitSubmissionInput {
    pub workspace_id: Uuid,
    pub submission_id: Uuid,
    pub actor_id: Uuid,
}

pub struct SubmitSubmissionUseCase<F, S>
where
    F: FormRepository,
    S: SubmissionRepository,
{
    pub forms: F,
    pub submissions: S,
}

impl<F, S> SubmitSubmissionUseCase<F, S>
where
    F: FormRepository,
    S: SubmissionRepository,
{
    pub async fn execute(&self, input: SubmitSubmissionInput) -> Result<NewOutboxEvent, SyncError> {
        let SubmitSubmissionInput {
            workspace_id,
            submission_id,
            actor_id,
        } = input;

        let submission = self
            .submissions
            .find_by_id(workspace_id, submission_id)
            .await?
            .ok_or(SyncError::AggregateNotFound {
                aggregate_type: AggregateType::Submission,
                aggregate_id: submission_id,
                workspace_id,
            })?;

        let engine_code = self
            .forms
            .engine_code_for_form(workspace_id, submission.form_id)
            .await?
            .ok_or(SyncError::EngineCodeUnresolved {
                aggregate_type: AggregateType::Submission,
                aggregate_id: submission_id,
            })?;

        let payload = EventPayload::submission_create(
            submission_id,
            engine_code,
            Some(submission.form_version_id),
        );
        let event = NewOutboxEvent::from_payload(workspace_id, &payload, Some(actor_id))?;
        self.submissions
            .submit_with_outbox(workspace_id, submission_id, actor_id, &event)
            .await?;

        tracing::info!(
            topic = %event.topic,
            submission_id = %submission_id,
            workspace_id = %workspace_id,
            "submission submitted"
        );
        Ok(event)
    }
}
