use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PlatformFormEngine::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlatformFormEngine::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PlatformFormEngine::Code)
                            .text()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(PlatformFormEngine::Name).text().not_null())
                    .col(ColumnDef::new(PlatformFormEngine::EngineVersion).text())
                    .col(
                        ColumnDef::new(PlatformFormEngine::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(PlatformFormEngine::IsDefault)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(PlatformFormEngine::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(PlatformFormEngine::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // At most one default engine.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS platform_form_engine_single_default_uq \
                 ON platform_form_engine (is_default) WHERE is_default = true",
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PlatformFormEngine::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PlatformFormEngine {
    Table,
    Id,
    Code,
    Name,
    EngineVersion,
    IsActive,
    IsDefault,
    CreatedAt,
    UpdatedAt,
}
