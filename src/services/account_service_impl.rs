//! `SeaORM` implementation of the `AccountService` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::clock::{self, SharedClock};
use crate::config::{BootstrapAdminConfig, SecurityConfig};
use crate::db::{AccountFilter, NewAccount, NewAuditEntry, Store};
use crate::entities::sessions;
use crate::models::{Account, Role, normalize_identifier};
use crate::services::account_service::{
    AccountError, AccountService, AccountStatistics, CreateAccountRequest, validate_email,
    validate_username,
};
use crate::services::password;

pub struct SeaOrmAccountService {
    store: Store,
    security: SecurityConfig,
    clock: SharedClock,
}

impl SeaOrmAccountService {
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

    async fn audit(&self, actor: i32, action: &str, description: String) {
        let entry = NewAuditEntry {
            account_id: actor,
            session_token: None,
            action: action.to_string(),
            description,
            client_address: None,
        };
        if let Err(e) = self.store.audit().append(entry, self.clock.now()).await {
            warn!(action, error = %e, "Failed to write audit entry");
        }
    }

    async fn load(&self, id: i32) -> Result<Account, AccountError> {
        self.store
            .accounts()
            .get_by_id(id)
            .await?
            .map(Account::from)
            .ok_or_else(|| AccountError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl AccountService for SeaOrmAccountService {
    async fn create_account(
        &self,
        request: CreateAccountRequest,
        actor: Option<i32>,
    ) -> Result<Account, AccountError> {
        let username = normalize_identifier(&request.username);
        let email = normalize_identifier(&request.email);

        validate_username(&username)?;
        validate_email(&email)?;
        password::check_policy(&request.password, &self.security.password_policy)
            .map_err(AccountError::Validation)?;

        let accounts = self.store.accounts();

        if accounts.get_by_username(&username).await?.is_some() {
            return Err(AccountError::UsernameTaken(username));
        }
        if accounts.get_by_email(&email).await?.is_some() {
            return Err(AccountError::EmailTaken(email));
        }

        let password_hash =
            password::hash_password(&request.password, self.security.pbkdf2_iterations).await?;

        let created = accounts
            .create(
                NewAccount {
                    username,
                    email,
                    password_hash,
                    role: request.role.as_str().to_string(),
                    must_change_password: request.must_change_password,
                },
                self.clock.now(),
            )
            .await?;

        info!(username = %created.username, role = %created.role, "Account created");
        self.audit(
            actor.unwrap_or(created.id),
            "account_created",
            format!(
                "Created account {} with role {}",
                created.username, created.role
            ),
        )
        .await;

        Ok(Account::from(created))
    }

    async fn get_account(&self, id: i32) -> Result<Account, AccountError> {
        self.load(id).await
    }

    async fn get_by_username(&self, username: &str) -> Result<Account, AccountError> {
        self.store
            .accounts()
            .get_by_username(username)
            .await?
            .map(Account::from)
            .ok_or_else(|| AccountError::NotFound(username.to_string()))
    }

    async fn list_accounts(&self, filter: &AccountFilter) -> Result<Vec<Account>, AccountError> {
        let accounts = self.store.accounts().list(filter).await?;
        Ok(accounts.into_iter().map(Account::from).collect())
    }

    async fn update_role(&self, id: i32, role: Role, actor: i32) -> Result<Account, AccountError> {
        let account = self.load(id).await?;

        if id == actor {
            return Err(AccountError::Forbidden(
                "You cannot change your own role".to_string(),
            ));
        }

        self.store
            .accounts()
            .set_role(id, role.as_str(), self.clock.now())
            .await?;

        info!(username = %account.username, from = %account.role, to = %role, "Role changed");
        self.audit(
            actor,
            "role_change",
            format!(
                "Changed role of {} from {} to {role}",
                account.username, account.role
            ),
        )
        .await;

        self.load(id).await
    }

    async fn update_email(
        &self,
        id: i32,
        email: &str,
        actor: i32,
    ) -> Result<Account, AccountError> {
        let account = self.load(id).await?;
        let email = normalize_identifier(email);
        validate_email(&email)?;

        if let Some(other) = self.store.accounts().get_by_email(&email).await?
            && other.id != id
        {
            return Err(AccountError::EmailTaken(email));
        }

        self.store
            .accounts()
            .set_email(id, &email, self.clock.now())
            .await?;

        self.audit(
            actor,
            "email_change",
            format!("Changed email of {} to {email}", account.username),
        )
        .await;

        self.load(id).await
    }

    async fn set_active(
        &self,
        id: i32,
        active: bool,
        actor: i32,
    ) -> Result<Account, AccountError> {
        let account = self.load(id).await?;

        if id == actor && !active {
            return Err(AccountError::Forbidden(
                "You cannot deactivate your own account".to_string(),
            ));
        }

        self.store
            .accounts()
            .set_active(id, active, self.clock.now())
            .await?;

        let action = if active {
            "account_activated"
        } else {
            "account_deactivated"
        };
        info!(username = %account.username, active, "Account status changed");
        self.audit(actor, action, format!("Account {}", account.username))
            .await;

        self.load(id).await
    }

    async fn unlock(&self, id: i32, actor: i32) -> Result<Account, AccountError> {
        let account = self.load(id).await?;

        self.store
            .accounts()
            .clear_lockout(id, self.clock.now())
            .await?;

        info!(username = %account.username, "Account unlocked");
        self.audit(
            actor,
            "account_unlocked",
            format!("Unlocked account {}", account.username),
        )
        .await;

        self.load(id).await
    }

    async fn suspend(
        &self,
        id: i32,
        reason: &str,
        until: Option<DateTime<Utc>>,
        actor: i32,
    ) -> Result<Account, AccountError> {
        let account = self.load(id).await?;

        if id == actor {
            return Err(AccountError::Forbidden(
                "You cannot suspend your own account".to_string(),
            ));
        }

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AccountError::Validation(
                "A suspension needs a reason".to_string(),
            ));
        }

        let now = self.clock.now();
        if until.is_some_and(|until| until <= now) {
            return Err(AccountError::Validation(
                "Suspension end must be in the future".to_string(),
            ));
        }

        self.store
            .accounts()
            .suspend(id, reason, until, actor, now)
            .await?;

        let until_text = until.map_or_else(
            || "until lifted".to_string(),
            |until| format!("until {}", until.format("%Y-%m-%d %H:%M UTC")),
        );
        info!(username = %account.username, reason, "Account suspended");
        self.audit(
            actor,
            "account_suspended",
            format!("Suspended {} {until_text}: {reason}", account.username),
        )
        .await;

        self.load(id).await
    }

    async fn lift_suspension(&self, id: i32, actor: i32) -> Result<Account, AccountError> {
        let account = self.load(id).await?;

        if account.suspended_at.is_none() {
            return Err(AccountError::Validation(format!(
                "{} is not suspended",
                account.username
            )));
        }

        self.store
            .accounts()
            .clear_suspension(id, self.clock.now())
            .await?;

        info!(username = %account.username, "Suspension lifted");
        self.audit(
            actor,
            "account_unsuspended",
            format!("Lifted suspension of {}", account.username),
        )
        .await;

        self.load(id).await
    }

    async fn reset_password(
        &self,
        id: i32,
        new_password: &str,
        actor: i32,
    ) -> Result<(), AccountError> {
        let account = self.load(id).await?;

        password::check_policy(new_password, &self.security.password_policy)
            .map_err(AccountError::Validation)?;

        let history = self.security.password_history_size;
        if password::reused_recently(&self.store, id, new_password, history).await? {
            return Err(AccountError::Validation(format!(
                "Password is among the last {history} used by {}",
                account.username
            )));
        }

        let hash = password::hash_password(new_password, self.security.pbkdf2_iterations).await?;
        let now = self.clock.now();
        let accounts = self.store.accounts();
        accounts.update_password(id, hash, true, now).await?;
        accounts.clear_lockout(id, now).await?;

        info!(username = %account.username, "Password reset by administrator");
        self.audit(
            actor,
            "password_reset",
            format!("Reset password of {}", account.username),
        )
        .await;

        Ok(())
    }

    async fn delete_account(&self, id: i32, actor: i32) -> Result<(), AccountError> {
        let account = self.load(id).await?;

        if id == actor {
            return Err(AccountError::Forbidden(
                "You cannot delete your own account".to_string(),
            ));
        }

        // Written first: the row it describes is about to disappear.
        self.audit(
            actor,
            "account_deleted",
            format!("Deleted account {} ({})", account.username, account.email),
        )
        .await;

        if !self.store.accounts().delete(id).await? {
            return Err(AccountError::NotFound(id.to_string()));
        }

        info!(username = %account.username, "Account deleted");
        Ok(())
    }

    async fn sessions(&self, id: i32) -> Result<Vec<sessions::Model>, AccountError> {
        self.load(id).await?;
        Ok(self.store.sessions().list_for_account(id).await?)
    }

    async fn statistics(&self) -> Result<AccountStatistics, AccountError> {
        let accounts = self.store.accounts();

        let total = accounts.count().await?;
        let active = accounts.count_active().await?;

        Ok(AccountStatistics {
            total,
            active,
            inactive: total.saturating_sub(active),
            locked: accounts.count_locked(self.clock.now()).await?,
            suspended: accounts.count_suspended(self.clock.now()).await?,
            active_sessions: self.store.sessions().count_active().await?,
            by_role: accounts.count_by_role().await?,
        })
    }

    async fn ensure_default_admin(
        &self,
        bootstrap: &BootstrapAdminConfig,
    ) -> Result<Option<Account>, AccountError> {
        if !bootstrap.enabled || self.store.accounts().count().await? > 0 {
            return Ok(None);
        }

        let account = self
            .create_account(
                CreateAccountRequest {
                    username: bootstrap.username.clone(),
                    email: bootstrap.email.clone(),
                    password: bootstrap.password.clone(),
                    role: Role::SuperAdmin,
                    must_change_password: true,
                },
                None,
            )
            .await?;

        warn!(
            username = %account.username,
            "Created default administrator account; change its password now"
        );

        Ok(Some(account))
    }
}
