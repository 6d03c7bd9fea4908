use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Form::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Form::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Form::WorkspaceId).uuid().not_null())
                    .col(ColumnDef::new(Form::FormEngineId).uuid().not_null())
                    .col(ColumnDef::new(Form::Slug).text().not_null())
                    .col(ColumnDef::new(Form::Name).text().not_null())
                    .col(
                        ColumnDef::new(Form::Status)
                            .text()
                            .not_null()
                            .default("draft"),
                    )
                    .col(
                        ColumnDef::new(Form::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Form::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Form::CreatedBy).uuid().not_null())
                    .col(ColumnDef::new(Form::UpdatedBy).uuid().not_null())
                    .col(ColumnDef::new(Form::DeletedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_form_form_engine")
                            .from(Form::Table, Form::FormEngineId)
                            .to(PlatformFormEngine::Table, PlatformFormEngine::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Form::Table)
                    .col(Form::WorkspaceId)
                    .col(Form::Slug)
                    .unique()
                    .name("form_workspace_slug_uq")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Form::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Form {
    Table,
    Id,
    WorkspaceId,
    FormEngineId,
    Slug,
    Name,
    Status,
    CreatedAt,
    UpdatedAt,
    CreatedBy,
    UpdatedBy,
    DeletedAt,
}

#[derive(Iden)]
enum PlatformFormEngine {
    Table,
    Id,
}
