use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use soba_domain::aggregate::{AggregateType, UnknownAggregateType};
use soba_domain::events::PayloadError;

/// Failure of one outbox item, of a store operation, or of an ops request.
///
/// The display string of an item failure is what lands in `last_error`.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    InvalidPayload(#[from] PayloadError),
    #[error(transparent)]
    UnsupportedAggregateType(#[from] UnknownAggregateType),
    #[error("{aggregate_type} {aggregate_id} not found in workspace {workspace_id}")]
    AggregateNotFound {
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
        workspace_id: Uuid,
    },
    #[error("no form engine configured for {aggregate_type} {aggregate_id}")]
    EngineCodeUnresolved {
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
    },
    #[error("form engine not installed: {0}")]
    EngineNotInstalled(String),
    /// Adapter failure; displays the adapter's own message unchanged.
    #[error("{cause}")]
    Engine {
        engine_code: String,
        cause: anyhow::Error,
    },
    #[error("form engine {engine_code} did not answer within {timeout_ms}ms")]
    EngineTimeout { engine_code: String, timeout_ms: u64 },
    #[error("outbox store unavailable: {0}")]
    StoreUnavailable(anyhow::Error),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SyncError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::UnsupportedAggregateType(_) => "UNSUPPORTED_AGGREGATE_TYPE",
            Self::AggregateNotFound { .. } => "AGGREGATE_NOT_FOUND",
            Self::EngineCodeUnresolved { .. } => "ENGINE_CODE_UNRESOLVED",
            Self::EngineNotInstalled(_) => "ENGINE_NOT_INSTALLED",
            Self::Engine { .. } => "ENGINE_FAILED",
            Self::EngineTimeout { .. } => "ENGINE_TIMEOUT",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidPayload(_) | Self::UnsupportedAggregateType(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::AggregateNotFound { .. } | Self::EngineNotInstalled(_) => StatusCode::NOT_FOUND,
            Self::EngineCodeUnresolved { .. } => StatusCode::CONFLICT,
            Self::Engine { .. } => StatusCode::BAD_GATEWAY,
            Self::EngineTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // TraceLayer already records every request; only server-side faults
        // carry a chain worth logging here.
        let message = match &self {
            Self::Internal(e) => {
                tracing::error!(error = %format!("{e:#}"), kind = "INTERNAL", "internal error");
                "internal error".to_owned()
            }
            Self::StoreUnavailable(e) => {
                tracing::error!(error = %format!("{e:#}"), kind = "STORE_UNAVAILABLE", "store unavailable");
                "outbox store unavailable".to_owned()
            }
            other => other.to_string(),
        };
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": message,
        });
        (status, axum::Json(body)).into_response()
    }
}
