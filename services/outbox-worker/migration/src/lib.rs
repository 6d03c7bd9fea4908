use sea_orm_migration::prelude::*;

mod m20261001_000001_create_platform_form_engines;
mod m20261001_000002_create_forms;
mod m20261001_000003_create_form_versions;
mod m20261001_000004_create_submissions;
mod m20261001_000005_create_integration_outbox;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_platform_form_engines::Migration),
            Box::new(m20261001_000002_create_forms::Migration),
            Box::new(m20261001_000003_create_form_versions::Migration),
            Box::new(m20261001_000004_create_submissions::Migration),
            Box::new(m20261001_000005_create_integration_outbox::Migration),
        ]
    }
}
