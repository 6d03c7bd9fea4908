use sea_orm::entity::prelude::*;

/// Versioned definition of a form. The `engine_*` columns mirror the outbox
/// outcome for API readers.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "form_version")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub form_id: Uuid,
    pub version_no: i32,
    /// `draft` | `published` | ...
    pub state: String,
    pub engine_schema_ref: Option<String>,
    /// `pending` | `provisioning` | `ready` | `error`.
    pub engine_sync_status: String,
    pub engine_sync_error: Option<String>,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    pub published_by: Option<Uuid>,
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
}

impl Related<super::form::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Form.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
