//! Domain service for account administration.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use thiserror::Error;

use crate::config::BootstrapAdminConfig;
use crate::db::AccountFilter;
use crate::entities::sessions;
use crate::models::{Account, Role};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Username already exists: {0}")]
    UsernameTaken(String),

    #[error("Email already registered: {0}")]
    EmailTaken(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Operation not allowed: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AccountError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AccountError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateAccountRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub must_change_password: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountStatistics {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub locked: u64,
    pub suspended: u64,
    pub active_sessions: u64,
    pub by_role: Vec<(String, i64)>,
}

pub fn validate_username(username: &str) -> Result<(), AccountError> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]{3,32}$").expect("Invalid regex"));

    if re.is_match(username) {
        Ok(())
    } else {
        Err(AccountError::Validation(
            "Username must be 3-32 characters of letters, digits, '.', '_' or '-'".to_string(),
        ))
    }
}

pub fn validate_email(email: &str) -> Result<(), AccountError> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("Invalid regex")
    });

    if re.is_match(email) {
        Ok(())
    } else {
        Err(AccountError::Validation(format!(
            "Invalid email address: {email}"
        )))
    }
}

/// Domain service trait for account administration.
///
/// `actor` is the account performing the change and is recorded in the audit log.
#[async_trait::async_trait]
pub trait AccountService: Send + Sync {
    /// Creates an account after checking username/email uniqueness and the password policy.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::UsernameTaken`] or [`AccountError::EmailTaken`]
    /// without touching the existing account.
    async fn create_account(
        &self,
        request: CreateAccountRequest,
        actor: Option<i32>,
    ) -> Result<Account, AccountError>;

    async fn get_account(&self, id: i32) -> Result<Account, AccountError>;

    async fn get_by_username(&self, username: &str) -> Result<Account, AccountError>;

    async fn list_accounts(&self, filter: &AccountFilter) -> Result<Vec<Account>, AccountError>;

    async fn update_role(&self, id: i32, role: Role, actor: i32) -> Result<Account, AccountError>;

    async fn update_email(&self, id: i32, email: &str, actor: i32)
    -> Result<Account, AccountError>;

    /// Deactivating also ends every open session of the account.
    async fn set_active(&self, id: i32, active: bool, actor: i32)
    -> Result<Account, AccountError>;

    async fn unlock(&self, id: i32, actor: i32) -> Result<Account, AccountError>;

    /// Blocks sign-in until `until`, or until lifted when `until` is `None`.
    /// Open sessions of the account end immediately.
    async fn suspend(
        &self,
        id: i32,
        reason: &str,
        until: Option<DateTime<Utc>>,
        actor: i32,
    ) -> Result<Account, AccountError>;

    async fn lift_suspension(&self, id: i32, actor: i32) -> Result<Account, AccountError>;

    /// Sets a new password chosen by an administrator. The owner must change it at next login.
    /// Recently used passwords of the account are refused.
    async fn reset_password(
        &self,
        id: i32,
        new_password: &str,
        actor: i32,
    ) -> Result<(), AccountError>;

    async fn delete_account(&self, id: i32, actor: i32) -> Result<(), AccountError>;

    async fn sessions(&self, id: i32) -> Result<Vec<sessions::Model>, AccountError>;

    async fn statistics(&self) -> Result<AccountStatistics, AccountError>;

    /// Creates the bootstrap administrator when the account table is empty.
    /// Returns the new account, or `None` when accounts already exist.
    async fn ensure_default_admin(
        &self,
        bootstrap: &BootstrapAdminConfig,
    ) -> Result<Option<Account>, AccountError>;
}
