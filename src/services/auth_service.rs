//! Domain service for authentication.
//!
//! Handles login with lockout, single-session management, the audit trail
//! and password changes.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::entities::sessions;
use crate::models::{Account, Role};

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Account not found")]
    AccountNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is locked until {until}")]
    AccountLocked { until: DateTime<Utc> },

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Account is suspended: {reason}")]
    AccountSuspended {
        reason: String,
        until: Option<DateTime<Utc>>,
    },

    #[error("Session is invalid or has ended")]
    SessionInvalid,

    #[error("Permission denied: requires {required}")]
    PermissionDenied { required: Role },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub account: Account,
    pub session: sessions::Model,
}

/// Fails with [`AuthError::PermissionDenied`] unless `account` ranks at least `required`.
pub fn authorize(account: &Account, required: Role) -> Result<(), AuthError> {
    if account.has_permission(required) {
        Ok(())
    } else {
        Err(AuthError::PermissionDenied { required })
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials for a username or email and opens a session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] on a wrong password,
    /// [`AuthError::AccountLocked`] while a lockout is in force,
    /// [`AuthError::AccountSuspended`] during a suspension and
    /// [`AuthError::AccountInactive`] for deactivated accounts.
    async fn authenticate(
        &self,
        identifier: &str,
        password: &str,
        client_address: Option<&str>,
    ) -> Result<Authenticated, AuthError>;

    /// Ends a session. Returns `false` if the token was unknown or already ended.
    async fn logout(&self, token: &str) -> Result<bool, AuthError>;

    /// Appends an audit entry. Failures are logged, never returned.
    async fn log_activity(
        &self,
        account_id: i32,
        action: &str,
        description: &str,
        client_address: Option<&str>,
    );

    /// Like [`AuthService::log_activity`], also recording the session token.
    async fn log_session_activity(
        &self,
        session: &sessions::Model,
        action: &str,
        description: &str,
    );

    /// Resolves an active session to its account and records activity on it.
    async fn validate_session(&self, token: &str) -> Result<Account, AuthError>;

    /// Changes a password after checking the current one, the password policy
    /// and the recent password history.
    async fn change_password(
        &self,
        account_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn account(role: &str) -> Account {
        Account {
            id: 1,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            role: role.to_string(),
            is_active: true,
            must_change_password: false,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            password_changed_at: None,
            suspended_at: None,
            suspended_until: None,
            suspension_reason: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_authorize_by_rank() {
        assert!(authorize(&account("manager"), Role::User).is_ok());
        assert!(matches!(
            authorize(&account("user"), Role::Manager),
            Err(AuthError::PermissionDenied {
                required: Role::Manager
            })
        ));
    }

    #[test]
    fn test_unknown_role_has_no_permission() {
        assert!(authorize(&account("operator"), Role::Guest).is_err());
    }
}
