use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IntegrationOutbox::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IntegrationOutbox::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(IntegrationOutbox::WorkspaceId).uuid().not_null())
                    .col(ColumnDef::new(IntegrationOutbox::Topic).text().not_null())
                    .col(
                        ColumnDef::new(IntegrationOutbox::AggregateType)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(IntegrationOutbox::AggregateId).uuid().not_null())
                    .col(
                        ColumnDef::new(IntegrationOutbox::Payload)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IntegrationOutbox::Status)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(IntegrationOutbox::AttemptCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(IntegrationOutbox::NextAttemptAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(ColumnDef::new(IntegrationOutbox::LastError).text())
                    .col(
                        ColumnDef::new(IntegrationOutbox::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(IntegrationOutbox::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(IntegrationOutbox::CreatedBy).uuid())
                    .col(ColumnDef::new(IntegrationOutbox::UpdatedBy).uuid())
                    .check(Expr::cust(
                        "status IN ('pending', 'processing', 'done')",
                    ))
                    .to_owned(),
            )
            .await?;

        // Claim query: pending rows whose retry time has come.
        manager
            .create_index(
                Index::create()
                    .table(IntegrationOutbox::Table)
                    .col(IntegrationOutbox::Status)
                    .col(IntegrationOutbox::NextAttemptAt)
                    .name("idx_integration_outbox_status_next_attempt")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(IntegrationOutbox::Table)
                    .col(IntegrationOutbox::AggregateType)
                    .col(IntegrationOutbox::AggregateId)
                    .name("idx_integration_outbox_aggregate")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(IntegrationOutbox::Table)
                    .col(IntegrationOutbox::Status)
                    .col(IntegrationOutbox::WorkspaceId)
                    .name("idx_integration_outbox_status_workspace")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IntegrationOutbox::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum IntegrationOutbox {
    Table,
    Id,
    WorkspaceId,
    Topic,
    AggregateType,
    AggregateId,
    Payload,
    Status,
    AttemptCount,
    NextAttemptAt,
    LastError,
    CreatedAt,
    UpdatedAt,
    CreatedBy,
    UpdatedBy,
}
