use crate::entities::{password_history, prelude::PasswordHistory};
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (name, column) in [
            ("suspended_at", Accounts::SuspendedAt),
            ("suspended_until", Accounts::SuspendedUntil),
        ] {
            if !manager.has_column("accounts", name).await? {
                manager
                    .alter_table(
                        Table::alter()
                            .table(Accounts::Table)
                            .add_column(ColumnDef::new(column).timestamp_with_time_zone().null())
                            .to_owned(),
                    )
                    .await?;
            }
        }

        if !manager.has_column("accounts", "suspension_reason").await? {
            manager
                .alter_table(
                    Table::alter()
                        .table(Accounts::Table)
                        .add_column(ColumnDef::new(Accounts::SuspensionReason).string().null())
                        .to_owned(),
                )
                .await?;
        }

        if !manager.has_column("accounts", "suspended_by").await? {
            manager
                .alter_table(
                    Table::alter()
                        .table(Accounts::Table)
                        .add_column(ColumnDef::new(Accounts::SuspendedBy).integer().null())
                        .to_owned(),
                )
                .await?;
        }

        if !manager.has_table("password_history").await? {
            let schema = Schema::new(manager.get_database_backend());
            manager
                .create_table(schema.create_table_from_entity(PasswordHistory).to_owned())
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_password_history_account")
                        .table(PasswordHistory)
                        .col(password_history::Column::AccountId)
                        .col(password_history::Column::CreatedAt)
                        .to_owned(),
                )
                .await?;

            // Existing accounts start their history with the hash they hold now.
            manager
                .get_connection()
                .execute_unprepared(
                    "INSERT INTO password_history (account_id, password_hash, created_at) \
                     SELECT id, password_hash, COALESCE(password_changed_at, created_at) \
                     FROM accounts",
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PasswordHistory).if_exists().to_owned())
            .await?;

        for column in [
            Accounts::SuspendedBy,
            Accounts::SuspensionReason,
            Accounts::SuspendedUntil,
            Accounts::SuspendedAt,
        ] {
            manager
                .alter_table(
                    Table::alter()
                        .table(Accounts::Table)
                        .drop_column(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    SuspendedAt,
    SuspendedUntil,
    SuspensionReason,
    SuspendedBy,
}
