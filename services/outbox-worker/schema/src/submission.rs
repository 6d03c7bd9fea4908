use sea_orm::entity::prelude::*;

/// Submission against a specific form version.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "submission")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub form_id: Uuid,
    pub form_version_id: Uuid,
    pub submitted_by: Option<Uuid>,
    /// `draft` | `submitted` | ...
    pub workflow_state: String,
    pub engine_submission_ref: Option<String>,
    pub engine_sync_status: String,
    pub engine_sync_error: Option<String>,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub created_by: Uuid,
    pub updated_by: Uuid,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::form::Entity",
        from = "Column::FormId",
        to = "super::form::Column::Id"
    )]
    Form,
    #[sea_orm(
        belongs_to = "super::form_version::Entity",
        from = "Column::FormVersionId",
        to = "super::form_version::Column::Id"
    )]
    FormVersion,
}

impl Related<super::form::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Form.def()
    }
}

impl Related<super::form_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FormVersion.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
