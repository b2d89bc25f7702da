use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::entities::{accounts, password_history, prelude::*, sessions};
use crate::models::normalize_identifier;

/// Fields needed to create an account. The hash is produced by the caller.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub must_change_password: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub role: Option<String>,
    pub active: Option<bool>,
    /// Substring match on username or email.
    pub search: Option<String>,
}

/// Outcome of recording one failed login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedAttempt {
    pub attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
}

pub struct AccountRepository {
    conn: DatabaseConnection,
}

impl AccountRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<accounts::Model>> {
        Accounts::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account by ID")
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<accounts::Model>> {
        Accounts::find()
            .filter(accounts::Column::Username.eq(normalize_identifier(username)))
            .one(&self.conn)
            .await
            .context("Failed to query account by username")
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<accounts::Model>> {
        Accounts::find()
            .filter(accounts::Column::Email.eq(normalize_identifier(email)))
            .one(&self.conn)
            .await
            .context("Failed to query account by email")
    }

    /// Looks an account up by username, falling back to email.
    pub async fn get_by_identifier(&self, identifier: &str) -> Result<Option<accounts::Model>> {
        let identifier = normalize_identifier(identifier);
        Accounts::find()
            .filter(
                Condition::any()
                    .add(accounts::Column::Username.eq(identifier.as_str()))
                    .add(accounts::Column::Email.eq(identifier.as_str())),
            )
            .order_by_asc(accounts::Column::Id)
            .one(&self.conn)
            .await
            .context("Failed to query account by identifier")
    }

    pub async fn create(&self, account: NewAccount, now: DateTime<Utc>) -> Result<accounts::Model> {
        let active_model = accounts::ActiveModel {
            username: Set(normalize_identifier(&account.username)),
            email: Set(normalize_identifier(&account.email)),
            password_hash: Set(account.password_hash),
            role: Set(account.role),
            is_active: Set(true),
            must_change_password: Set(account.must_change_password),
            failed_login_attempts: Set(0),
            locked_until: Set(None),
            last_login_at: Set(None),
            password_changed_at: Set(Some(now)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let txn = self.conn.begin().await?;

        let created = active_model
            .insert(&txn)
            .await
            .context("Failed to insert account")?;
        record_password(&txn, created.id, created.password_hash.clone(), now).await?;

        txn.commit().await?;
        Ok(created)
    }

    pub async fn list(&self, filter: &AccountFilter) -> Result<Vec<accounts::Model>> {
        let mut query = Accounts::find().order_by_asc(accounts::Column::Username);

        if let Some(role) = &filter.role {
            query = query.filter(accounts::Column::Role.eq(role.as_str()));
        }

        if let Some(active) = filter.active {
            query = query.filter(accounts::Column::IsActive.eq(active));
        }

        if let Some(term) = filter
            .search
            .as_deref()
            .map(normalize_identifier)
            .filter(|s| !s.is_empty())
        {
            query = query.filter(
                Condition::any()
                    .add(accounts::Column::Username.contains(&term))
                    .add(accounts::Column::Email.contains(&term)),
            );
        }

        query
            .all(&self.conn)
            .await
            .context("Failed to list accounts")
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(Accounts::find().count(&self.conn).await?)
    }

    pub async fn count_active(&self) -> Result<u64> {
        Ok(Accounts::find()
            .filter(accounts::Column::IsActive.eq(true))
            .count(&self.conn)
            .await?)
    }

    pub async fn count_locked(&self, now: DateTime<Utc>) -> Result<u64> {
        Ok(Accounts::find()
            .filter(accounts::Column::LockedUntil.gt(now))
            .count(&self.conn)
            .await?)
    }

    /// Suspensions still in force at `now`.
    pub async fn count_suspended(&self, now: DateTime<Utc>) -> Result<u64> {
        Ok(Accounts::find()
            .filter(accounts::Column::SuspendedAt.is_not_null())
            .filter(
                Condition::any()
                    .add(accounts::Column::SuspendedUntil.is_null())
                    .add(accounts::Column::SuspendedUntil.gt(now)),
            )
            .count(&self.conn)
            .await?)
    }

    pub async fn count_by_role(&self) -> Result<Vec<(String, i64)>> {
        Accounts::find()
            .select_only()
            .column(accounts::Column::Role)
            .column_as(Expr::col(accounts::Column::Id).count(), "count")
            .group_by(accounts::Column::Role)
            .order_by_asc(accounts::Column::Role)
            .into_tuple::<(String, i64)>()
            .all(&self.conn)
            .await
            .context("Failed to count accounts by role")
    }

    /// Increments the failure counter and sets a lock once `max_attempts` is reached.
    pub async fn record_failed_attempt(
        &self,
        id: i32,
        max_attempts: i32,
        lockout: Duration,
        now: DateTime<Utc>,
    ) -> Result<FailedAttempt> {
        let txn = self.conn.begin().await?;

        let account = Accounts::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Account {id} not found"))?;

        let attempts = account.failed_login_attempts.saturating_add(1);
        let locked_until = if attempts >= max_attempts {
            Some(now.checked_add_signed(lockout).unwrap_or(DateTime::<Utc>::MAX_UTC))
        } else {
            account.locked_until
        };

        let mut active: accounts::ActiveModel = account.into();
        active.failed_login_attempts = Set(attempts);
        active.locked_until = Set(locked_until);
        active.updated_at = Set(now);
        active.update(&txn).await?;

        txn.commit().await?;

        Ok(FailedAttempt {
            attempts,
            locked_until,
        })
    }

    /// Resets the failure counter and removes any lock.
    pub async fn clear_lockout(&self, id: i32, now: DateTime<Utc>) -> Result<()> {
        Accounts::update_many()
            .col_expr(accounts::Column::FailedLoginAttempts, Expr::value(0))
            .col_expr(
                accounts::Column::LockedUntil,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
            .filter(accounts::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to clear account lockout")?;
        Ok(())
    }

    /// Stores a new hash and appends it to the password history.
    pub async fn update_password(
        &self,
        id: i32,
        password_hash: String,
        must_change_password: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let txn = self.conn.begin().await?;

        Accounts::update_many()
            .col_expr(accounts::Column::PasswordHash, Expr::value(password_hash.clone()))
            .col_expr(
                accounts::Column::MustChangePassword,
                Expr::value(must_change_password),
            )
            .col_expr(accounts::Column::PasswordChangedAt, Expr::value(Some(now)))
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
            .filter(accounts::Column::Id.eq(id))
            .exec(&txn)
            .await
            .context("Failed to update password")?;
        record_password(&txn, id, password_hash, now).await?;

        txn.commit().await?;
        Ok(())
    }

    /// The `limit` most recent hashes the account has held, newest first.
    pub async fn recent_password_hashes(&self, id: i32, limit: u64) -> Result<Vec<String>> {
        PasswordHistory::find()
            .select_only()
            .column(password_history::Column::PasswordHash)
            .filter(password_history::Column::AccountId.eq(id))
            .order_by_desc(password_history::Column::CreatedAt)
            .order_by_desc(password_history::Column::Id)
            .limit(limit)
            .into_tuple::<String>()
            .all(&self.conn)
            .await
            .context("Failed to query password history")
    }

    /// Marks the account suspended and ends its open sessions in one transaction.
    pub async fn suspend(
        &self,
        id: i32,
        reason: &str,
        until: Option<DateTime<Utc>>,
        suspended_by: i32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let txn = self.conn.begin().await?;

        Accounts::update_many()
            .col_expr(accounts::Column::SuspendedAt, Expr::value(Some(now)))
            .col_expr(accounts::Column::SuspendedUntil, Expr::value(until))
            .col_expr(
                accounts::Column::SuspensionReason,
                Expr::value(Some(reason.to_string())),
            )
            .col_expr(accounts::Column::SuspendedBy, Expr::value(Some(suspended_by)))
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
            .filter(accounts::Column::Id.eq(id))
            .exec(&txn)
            .await?;

        Sessions::update_many()
            .col_expr(sessions::Column::IsActive, Expr::value(false))
            .col_expr(sessions::Column::EndedAt, Expr::value(Some(now)))
            .filter(sessions::Column::AccountId.eq(id))
            .filter(sessions::Column::IsActive.eq(true))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(())
    }

    pub async fn clear_suspension(&self, id: i32, now: DateTime<Utc>) -> Result<()> {
        Accounts::update_many()
            .col_expr(
                accounts::Column::SuspendedAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(
                accounts::Column::SuspendedUntil,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(
                accounts::Column::SuspensionReason,
                Expr::value(Option::<String>::None),
            )
            .col_expr(accounts::Column::SuspendedBy, Expr::value(Option::<i32>::None))
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
            .filter(accounts::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to lift suspension")?;
        Ok(())
    }

    /// Replaces the stored hash without touching the change timestamp or flags.
    pub async fn replace_hash(&self, id: i32, password_hash: String) -> Result<()> {
        Accounts::update_many()
            .col_expr(accounts::Column::PasswordHash, Expr::value(password_hash))
            .filter(accounts::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to upgrade password hash")?;
        Ok(())
    }

    pub async fn set_role(&self, id: i32, role: &str, now: DateTime<Utc>) -> Result<()> {
        Accounts::update_many()
            .col_expr(accounts::Column::Role, Expr::value(role))
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
            .filter(accounts::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update role")?;
        Ok(())
    }

    pub async fn set_email(&self, id: i32, email: &str, now: DateTime<Utc>) -> Result<()> {
        Accounts::update_many()
            .col_expr(accounts::Column::Email, Expr::value(normalize_identifier(email)))
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
            .filter(accounts::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update email")?;
        Ok(())
    }

    /// Toggles the active flag. Deactivation also ends every open session
    /// of the account in the same transaction.
    pub async fn set_active(&self, id: i32, active: bool, now: DateTime<Utc>) -> Result<()> {
        let txn = self.conn.begin().await?;

        Accounts::update_many()
            .col_expr(accounts::Column::IsActive, Expr::value(active))
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
            .filter(accounts::Column::Id.eq(id))
            .exec(&txn)
            .await?;

        if !active {
            Sessions::update_many()
                .col_expr(sessions::Column::IsActive, Expr::value(false))
                .col_expr(sessions::Column::EndedAt, Expr::value(Some(now)))
                .filter(sessions::Column::AccountId.eq(id))
                .filter(sessions::Column::IsActive.eq(true))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Accounts::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete account")?;
        Ok(result.rows_affected > 0)
    }
}

async fn record_password(
    txn: &DatabaseTransaction,
    account_id: i32,
    password_hash: String,
    now: DateTime<Utc>,
) -> Result<()> {
    password_history::ActiveModel {
        account_id: Set(account_id),
        password_hash: Set(password_hash),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await
    .context("Failed to record password history")?;
    Ok(())
}
