use crate::entities::{milestones, prelude::*, subtasks};
use crate::models::catalog::{DEFAULT_MILESTONES, DEFAULT_SUBTASKS};
use sea_orm::{ActiveValue::Set, EntityTrait};
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
                    .create_table_from_entity(Milestones)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Subtasks)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_subtasks_milestone_name")
                    .table(Subtasks)
                    .col(subtasks::Column::MilestoneId)
                    .col(subtasks::Column::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        seed_default_catalog(manager).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Subtasks).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Milestones).to_owned())
            .await
    }
}

async fn seed_default_catalog(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    let db = manager.get_connection();
    let now = chrono::Utc::now();

    for (position, name) in (0_i32..).zip(DEFAULT_MILESTONES) {
        let milestone_id = Milestones::insert(milestones::ActiveModel {
            name: Set(name.to_string()),
            description: Set(None),
            position: Set(position),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        })
        .exec(db)
        .await?
        .last_insert_id;

        let rows: Vec<subtasks::ActiveModel> = (0_i32..)
            .zip(DEFAULT_SUBTASKS)
            .map(|(sub_position, (sub_name, criticality))| subtasks::ActiveModel {
                milestone_id: Set(milestone_id),
                name: Set(sub_name.to_string()),
                description: Set(None),
                criticality: Set(criticality.as_str().to_string()),
                position: Set(sub_position),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            })
            .collect();

        Subtasks::insert_many(rows).exec(db).await?;
    }

    Ok(())
}
