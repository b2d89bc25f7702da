use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};

use crate::entities::{accounts, prelude::*, sessions};

pub struct SessionRepository {
    conn: DatabaseConnection,
}

impl SessionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Records a successful login in one transaction: the account's failure
    /// state is reset, its previous sessions are ended and a new one is opened.
    pub async fn open_for_login(
        &self,
        account_id: i32,
        token: String,
        client_address: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<sessions::Model> {
        let txn = self.conn.begin().await?;

        Accounts::update_many()
            .col_expr(accounts::Column::FailedLoginAttempts, Expr::value(0))
            .col_expr(
                accounts::Column::LockedUntil,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(accounts::Column::LastLoginAt, Expr::value(Some(now)))
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
            .filter(accounts::Column::Id.eq(account_id))
            .exec(&txn)
            .await
            .context("Failed to reset login state")?;

        Sessions::update_many()
            .col_expr(sessions::Column::IsActive, Expr::value(false))
            .col_expr(sessions::Column::EndedAt, Expr::value(Some(now)))
            .filter(sessions::Column::AccountId.eq(account_id))
            .filter(sessions::Column::IsActive.eq(true))
            .exec(&txn)
            .await
            .context("Failed to end previous sessions")?;

        let session = sessions::ActiveModel {
            token: Set(token),
            account_id: Set(account_id),
            login_at: Set(now),
            last_activity_at: Set(now),
            client_address: Set(client_address),
            is_active: Set(true),
            ended_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .context("Failed to insert session")?;

        txn.commit().await?;
        Ok(session)
    }

    pub async fn get_by_token(&self, token: &str) -> Result<Option<sessions::Model>> {
        Sessions::find()
            .filter(sessions::Column::Token.eq(token))
            .one(&self.conn)
            .await
            .context("Failed to query session")
    }

    pub async fn get_active_by_token(&self, token: &str) -> Result<Option<sessions::Model>> {
        Sessions::find()
            .filter(sessions::Column::Token.eq(token))
            .filter(sessions::Column::IsActive.eq(true))
            .one(&self.conn)
            .await
            .context("Failed to query active session")
    }

    /// Ends the session if it is still active. Returns whether anything changed.
    pub async fn end(&self, token: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = Sessions::update_many()
            .col_expr(sessions::Column::IsActive, Expr::value(false))
            .col_expr(sessions::Column::EndedAt, Expr::value(Some(now)))
            .filter(sessions::Column::Token.eq(token))
            .filter(sessions::Column::IsActive.eq(true))
            .exec(&self.conn)
            .await
            .context("Failed to end session")?;
        Ok(result.rows_affected > 0)
    }

    pub async fn end_all_for_account(&self, account_id: i32, now: DateTime<Utc>) -> Result<u64> {
        let result = Sessions::update_many()
            .col_expr(sessions::Column::IsActive, Expr::value(false))
            .col_expr(sessions::Column::EndedAt, Expr::value(Some(now)))
            .filter(sessions::Column::AccountId.eq(account_id))
            .filter(sessions::Column::IsActive.eq(true))
            .exec(&self.conn)
            .await
            .context("Failed to end account sessions")?;
        Ok(result.rows_affected)
    }

    pub async fn touch(&self, id: i32, now: DateTime<Utc>) -> Result<()> {
        Sessions::update_many()
            .col_expr(sessions::Column::LastActivityAt, Expr::value(now))
            .filter(sessions::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update session activity")?;
        Ok(())
    }

    pub async fn list_for_account(&self, account_id: i32) -> Result<Vec<sessions::Model>> {
        Sessions::find()
            .filter(sessions::Column::AccountId.eq(account_id))
            .order_by_desc(sessions::Column::LoginAt)
            .order_by_desc(sessions::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list sessions")
    }

    pub async fn count_active(&self) -> Result<u64> {
        Ok(Sessions::find()
            .filter(sessions::Column::IsActive.eq(true))
            .count(&self.conn)
            .await?)
    }
}
