use sea_orm_migration::prelude::*;

mod m20250301_create_accounts;
mod m20250301_create_catalog;
mod m20250301_create_workflow_entries;
mod m20250420_add_suspension_and_password_history;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_create_accounts::Migration),
            Box::new(m20250301_create_catalog::Migration),
            Box::new(m20250301_create_workflow_entries::Migration),
            Box::new(m20250420_add_suspension_and_password_history::Migration),
        ]
    }
}
