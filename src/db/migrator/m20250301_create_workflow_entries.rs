use crate::entities::{prelude::*, workflow_entries};
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(WorkflowEntries)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(SiteSchedules)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Serves the "latest status per (milestone, subtask, site)" lookup.
        manager
            .create_index(
                Index::create()
                    .name("idx_workflow_entries_status_key")
                    .table(WorkflowEntries)
                    .col(workflow_entries::Column::Milestone)
                    .col(workflow_entries::Column::Subtask)
                    .col(workflow_entries::Column::SiteCode)
                    .col(workflow_entries::Column::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_workflow_entries_site")
                    .table(WorkflowEntries)
                    .col(workflow_entries::Column::SiteCode)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SiteSchedules).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WorkflowEntries).to_owned())
            .await
    }
}
