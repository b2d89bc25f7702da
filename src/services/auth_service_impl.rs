//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use chrono::Duration;
use tracing::{debug, info, warn};

use crate::clock::{self, SharedClock};
use crate::config::SecurityConfig;
use crate::db::{NewAuditEntry, Store};
use crate::entities::sessions;
use crate::models::Account;
use crate::services::auth_service::{AuthError, AuthService, Authenticated};
use crate::services::password;

/// 64 lowercase hex characters from 32 random bytes.
#[must_use]
pub fn generate_session_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

pub struct SeaOrmAuthService {
    store: Store,
    security: SecurityConfig,
    clock: SharedClock,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(store: Store, security: SecurityConfig) -> Self {
        Self::with_clock(store, security, clock::system())
    }

    #[must_use]
    pub fn with_clock(store: Store, security: SecurityConfig, clock: SharedClock) -> Self {
        Self {
            store,
            security,
            clock,
        }
    }

    async fn append_audit(&self, entry: NewAuditEntry) {
        let action = entry.action.clone();
        if let Err(e) = self.store.audit().append(entry, self.clock.now()).await {
            warn!(action = %action, error = %e, "Failed to write audit entry");
        }
    }

    /// Re-hashes with the configured iteration count when the stored hash is weaker.
    async fn upgrade_hash_if_needed(&self, account_id: i32, stored: &str, password: &str) {
        if !self.security.upgrade_password_hashes {
            return;
        }

        let target = self.security.pbkdf2_iterations;
        let Some(current) = password::iterations_of(stored) else {
            return;
        };
        if current >= target {
            return;
        }

        let result: anyhow::Result<()> = async {
            let hash = password::hash_password(password, target).await?;
            self.store.accounts().replace_hash(account_id, hash).await
        }
        .await;

        match result {
            Ok(()) => info!(account_id, from = current, to = target, "Upgraded password hash"),
            Err(e) => warn!(account_id, error = %e, "Failed to upgrade password hash"),
        }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn authenticate(
        &self,
        identifier: &str,
        password: &str,
        client_address: Option<&str>,
    ) -> Result<Authenticated, AuthError> {
        let now = self.clock.now();
        let accounts = self.store.accounts();

        let Some(mut account) = accounts.get_by_identifier(identifier).await? else {
            debug!(identifier, "Login attempt for unknown account");
            return Err(AuthError::AccountNotFound);
        };

        if !account.is_active {
            warn!(username = %account.username, "Login attempt for inactive account");
            return Err(AuthError::AccountInactive);
        }

        if account.suspended_at.is_some() {
            match account.suspended_until {
                Some(until) if until <= now => {
                    accounts.clear_suspension(account.id, now).await?;
                    info!(username = %account.username, "Suspension expired");
                }
                until => {
                    warn!(username = %account.username, "Login attempt while suspended");
                    return Err(AuthError::AccountSuspended {
                        reason: account.suspension_reason.clone().unwrap_or_default(),
                        until,
                    });
                }
            }
        }

        if let Some(until) = account.locked_until {
            if until > now {
                warn!(username = %account.username, %until, "Login attempt while locked");
                return Err(AuthError::AccountLocked { until });
            }

            accounts.clear_lockout(account.id, now).await?;
            account.failed_login_attempts = 0;
            account.locked_until = None;
        }

        if !password::verify_password(password, &account.password_hash).await? {
            let max_attempts = i32::try_from(self.security.max_failed_attempts).unwrap_or(i32::MAX);
            let failed = accounts
                .record_failed_attempt(
                    account.id,
                    max_attempts,
                    Duration::minutes(self.security.lockout_minutes),
                    now,
                )
                .await?;

            self.log_activity(
                account.id,
                "login_failed",
                &format!(
                    "Failed login attempt {} of {max_attempts}",
                    failed.attempts
                ),
                client_address,
            )
            .await;

            if let Some(until) = failed.locked_until {
                warn!(
                    username = %account.username,
                    attempts = failed.attempts,
                    %until,
                    "Account locked after repeated failures"
                );
            }

            return Err(AuthError::InvalidCredentials);
        }

        let session = self
            .store
            .sessions()
            .open_for_login(
                account.id,
                generate_session_token(),
                client_address.map(str::to_string),
                now,
            )
            .await?;

        self.log_session_activity(&session, "login", "Successful login")
            .await;

        self.upgrade_hash_if_needed(account.id, &account.password_hash, password)
            .await;

        let account = accounts
            .get_by_id(account.id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        info!(username = %account.username, "User logged in");

        Ok(Authenticated {
            account: Account::from(account),
            session,
        })
    }

    async fn logout(&self, token: &str) -> Result<bool, AuthError> {
        let sessions = self.store.sessions();

        let Some(session) = sessions.get_active_by_token(token).await? else {
            return Ok(false);
        };

        if !sessions.end(token, self.clock.now()).await? {
            return Ok(false);
        }

        self.log_session_activity(&session, "logout", "User logged out")
            .await;
        info!(account_id = session.account_id, "User logged out");

        Ok(true)
    }

    async fn log_activity(
        &self,
        account_id: i32,
        action: &str,
        description: &str,
        client_address: Option<&str>,
    ) {
        self.append_audit(NewAuditEntry {
            account_id,
            session_token: None,
            action: action.to_string(),
            description: description.to_string(),
            client_address: client_address.map(str::to_string),
        })
        .await;
    }

    async fn log_session_activity(
        &self,
        session: &sessions::Model,
        action: &str,
        description: &str,
    ) {
        self.append_audit(NewAuditEntry {
            account_id: session.account_id,
            session_token: Some(session.token.clone()),
            action: action.to_string(),
            description: description.to_string(),
            client_address: session.client_address.clone(),
        })
        .await;
    }

    async fn validate_session(&self, token: &str) -> Result<Account, AuthError> {
        let now = self.clock.now();
        let sessions = self.store.sessions();

        let session = sessions
            .get_active_by_token(token)
            .await?
            .ok_or(AuthError::SessionInvalid)?;

        let account = self
            .store
            .accounts()
            .get_by_id(session.account_id)
            .await?
            .map(Account::from)
            .filter(|a| a.is_active && !a.is_suspended(now))
            .ok_or(AuthError::SessionInvalid)?;

        sessions.touch(session.id, now).await?;

        Ok(account)
    }

    async fn change_password(
        &self,
        account_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let accounts = self.store.accounts();

        let account = accounts
            .get_by_id(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if !password::verify_password(current_password, &account.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        if current_password == new_password {
            return Err(AuthError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        password::check_policy(new_password, &self.security.password_policy)
            .map_err(AuthError::Validation)?;

        let history = self.security.password_history_size;
        if password::reused_recently(&self.store, account_id, new_password, history).await? {
            return Err(AuthError::Validation(format!(
                "Password was used recently; choose one not among your last {history}"
            )));
        }

        let hash = password::hash_password(new_password, self.security.pbkdf2_iterations).await?;
        accounts
            .update_password(account_id, hash, false, self.clock.now())
            .await?;

        self.log_activity(account_id, "password_change", "Password changed", None)
            .await;
        info!(username = %account.username, "Password changed");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::generate_session_token;

    #[test]
    fn test_session_token_shape() {
        let token = generate_session_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(token, generate_session_token());
    }
}
