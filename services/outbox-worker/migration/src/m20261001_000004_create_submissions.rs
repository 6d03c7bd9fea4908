use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Submission::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Submission::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Submission::WorkspaceId).uuid().not_null())
                    .col(ColumnDef::new(Submission::FormId).uuid().not_null())
                    .col(ColumnDef::new(Submission::FormVersionId).uuid().not_null())
                    .col(ColumnDef::new(Submission::SubmittedBy).uuid())
                    .col(
                        ColumnDef::new(Submission::WorkflowState)
                            .text()
                            .not_null()
                            .default("draft"),
                    )
                    .col(ColumnDef::new(Submission::EngineSubmissionRef).text())
                    .col(
                        ColumnDef::new(Submission::EngineSyncStatus)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Submission::EngineSyncError).text())
                    .col(ColumnDef::new(Submission::SubmittedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Submission::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Submission::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Submission::CreatedBy).uuid().not_null())
                    .col(ColumnDef::new(Submission::UpdatedBy).uuid().not_null())
                    .col(ColumnDef::new(Submission::DeletedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_submission_form")
                            .from(Submission::Table, Submission::FormId)
                            .to(Form::Table, Form::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_submission_form_version")
                            .from(Submission::Table, Submission::FormVersionId)
                            .to(FormVersion::Table, FormVersion::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Submission::Table)
                    .col(Submission::WorkspaceId)
                    .col(Submission::FormVersionId)
                    .name("idx_submission_workspace_form_version")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Submission::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Submission {
    Table,
    Id,
    WorkspaceId,
    FormId,
    FormVersionId,
    SubmittedBy,
    WorkflowState,
    EngineSubmissionRef,
    EngineSyncStatus,
    EngineSyncError,
    SubmittedAt,
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

#[derive(Iden)]
enum FormVersion {
    Table,
    Id,
}
