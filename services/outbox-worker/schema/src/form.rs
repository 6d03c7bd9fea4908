use sea_orm::entity::prelude::*;

/// Form owned by a workspace, pinned to one platform form engine.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "form")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub form_engine_id: Uuid,
    pub slug: String,
    pub name: String,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub created_by: Uuid,
    pub updated_by: Uuid,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::platform_form_engine::Entity",
        from = "Column::FormEngineId",
        to = "super::platform_form_engine::Column::Id"
    )]
    FormEngine,
    #[sea_orm(has_many = "super::form_version::Entity")]
    FormVersions,
}

impl Related<super::platform_form_engine::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FormEngine.def()
    }
}

impl Related<super::form_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FormVersions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
