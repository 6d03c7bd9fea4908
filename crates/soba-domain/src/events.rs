//! Outbox event payloads.
//!
//! One schema per [`AggregateType`]. Producers go through [`EventPayload::encode`],
//! which insists on a pinned `engineCode`. The worker goes through
//! [`EventPayload::decode_for`], which checks the aggregate id against the
//! owning record but tolerates a missing `engineCode` (the worker then derives
//! it from the form).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::aggregate::AggregateType;

/// Payload for `form_engine.{engineCode}.form_version.create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormVersionCreatePayload {
    pub form_version_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_id: Option<Uuid>,
}

/// Payload for `form_engine.{engineCode}.submission.create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionCreatePayload {
    pub submission_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_version_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    FormVersionCreate(FormVersionCreatePayload),
    SubmissionCreate(SubmissionCreatePayload),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("invalid {aggregate_type} payload: {reason}")]
    Malformed {
        aggregate_type: AggregateType,
        reason: String,
    },
    #[error("invalid {aggregate_type} payload: engineCode is required")]
    MissingEngineCode { aggregate_type: AggregateType },
    #[error(
        "invalid {aggregate_type} payload: targets {payload_id} but the record aggregate is {aggregate_id}"
    )]
    AggregateMismatch {
        aggregate_type: AggregateType,
        payload_id: Uuid,
        aggregate_id: Uuid,
    },
}

impl EventPayload {
    pub fn form_version_create(
        form_version_id: Uuid,
        engine_code: impl Into<String>,
        form_id: Option<Uuid>,
    ) -> Self {
        Self::FormVersionCreate(FormVersionCreatePayload {
            form_version_id,
            engine_code: Some(engine_code.into()),
            form_id,
        })
    }

    pub fn submission_create(
        submission_id: Uuid,
        engine_code: impl Into<String>,
        form_version_id: Option<Uuid>,
    ) -> Self {
        Self::SubmissionCreate(SubmissionCreatePayload {
            submission_id,
            engine_code: Some(engine_code.into()),
            form_version_id,
        })
    }

    pub fn aggregate_type(&self) -> AggregateType {
        match self {
            Self::FormVersionCreate(_) => AggregateType::FormVersion,
            Self::SubmissionCreate(_) => AggregateType::Submission,
        }
    }

    pub fn aggregate_id(&self) -> Uuid {
        match self {
            Self::FormVersionCreate(p) => p.form_version_id,
            Self::SubmissionCreate(p) => p.submission_id,
        }
    }

    /// Pinned engine code, if present and not blank.
    pub fn engine_code(&self) -> Option<&str> {
        let code = match self {
            Self::FormVersionCreate(p) => p.engine_code.as_deref(),
            Self::SubmissionCreate(p) => p.engine_code.as_deref(),
        };
        code.filter(|c| !c.trim().is_empty())
    }

    /// Parse a stored payload for the given aggregate kind.
    pub fn decode(aggregate_type: AggregateType, value: &Value) -> Result<Self, PayloadError> {
        let malformed = |e: serde_json::Error| PayloadError::Malformed {
            aggregate_type,
            reason: e.to_string(),
        };
        match aggregate_type {
            AggregateType::FormVersion => FormVersionCreatePayload::deserialize(value)
                .map(Self::FormVersionCreate)
                .map_err(malformed),
            AggregateType::Submission => SubmissionCreatePayload::deserialize(value)
                .map(Self::SubmissionCreate)
                .map_err(malformed),
        }
    }

    /// [`decode`](Self::decode), then check that the payload describes the
    /// record's own aggregate.
    pub fn decode_for(
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
        value: &Value,
    ) -> Result<Self, PayloadError> {
        let payload = Self::decode(aggregate_type, value)?;
        if payload.aggregate_id() != aggregate_id {
            return Err(PayloadError::AggregateMismatch {
                aggregate_type,
                payload_id: payload.aggregate_id(),
                aggregate_id,
            });
        }
        Ok(payload)
    }

    /// Serialize for enqueue. Fails unless an engine code is pinned.
    pub fn encode(&self) -> Result<Value, PayloadError> {
        let aggregate_type = self.aggregate_type();
        if self.engine_code().is_none() {
            return Err(PayloadError::MissingEngineCode { aggregate_type });
        }
        let encoded = match self {
            Self::FormVersionCreate(p) => serde_json::to_value(p),
            Self::SubmissionCreate(p) => serde_json::to_value(p),
        };
        encoded.map_err(|e| PayloadError::Malformed {
            aggregate_type,
            reason: e.to_string(),
        })
    }
}
