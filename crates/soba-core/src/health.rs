use axum::http::StatusCode;
use sea_orm::DatabaseConnection;

/// Handler for `GET /healthz`: liveness check.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Readiness status for a process whose only hard dependency is the database.
/// Wire into a service-specific `GET /readyz` handler.
pub async fn database_readiness(db: &DatabaseConnection) -> StatusCode {
    match db.ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            ::tracing::warn!(error = %e, "readiness probe: database ping failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
