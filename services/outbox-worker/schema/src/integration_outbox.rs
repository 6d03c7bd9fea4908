use sea_orm::entity::prelude::*;

/// Outbox record for reliable delivery of form-engine provisioning events.
/// Written in the same transaction as the business mutation; mutated only by
/// the worker; never deleted except by the retention purge.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "integration_outbox")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub topic: String,
    /// `form_version` | `submission`; kept as text so unknown kinds still load.
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub payload: Json,
    /// `pending` | `processing` | `done`.
    pub status: String,
    pub attempt_count: i32,
    pub next_attempt_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
