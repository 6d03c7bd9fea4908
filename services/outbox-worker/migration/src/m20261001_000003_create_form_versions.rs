use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FormVersion::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FormVersion::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FormVersion::WorkspaceId).uuid().not_null())
                    .col(ColumnDef::new(FormVersion::FormId).uuid().not_null())
                    .col(ColumnDef::new(FormVersion::VersionNo).integer().not_null())
                    .col(
                        ColumnDef::new(FormVersion::State)
                            .text()
                            .not_null()
                            .default("draft"),
                    )
                    .col(ColumnDef::new(FormVersion::EngineSchemaRef).text())
                    .col(
                        ColumnDef::new(FormVersion::EngineSyncStatus)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(FormVersion::EngineSyncError).text())
                    .col(ColumnDef::new(FormVersion::PublishedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(FormVersion::PublishedBy).uuid())
                    .col(
                        ColumnDef::new(FormVersion::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(FormVersion::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(FormVersion::CreatedBy).uuid().not_null())
                    .col(ColumnDef::new(FormVersion::UpdatedBy).uuid().not_null())
                    .col(ColumnDef::new(FormVersion::DeletedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_form_version_form")
                            .from(FormVersion::Table, FormVersion::FormId)
                            .to(Form::Table, Form::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(FormVersion::Table)
                    .col(FormVersion::FormId)
                    .col(FormVersion::VersionNo)
                    .unique()
                    .name("form_version_form_version_no_uq")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FormVersion::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum FormVersion {
    Table,
    Id,
    WorkspaceId,
    FormId,
    VersionNo,
    State,
    EngineSchemaRef,
    EngineSyncStatus,
    EngineSyncError,
    PublishedAt,
    PublishedBy,
    CreatedAt,
    UpdatedAt,
    CreatedBy,
    UpdatedBy,
    DeletedAt,
}

#[derive(Iden)]
enum Form {
    Table,
    Id,
}
