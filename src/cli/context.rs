//! Services wired to one database connection, shared by commands and the console.

use anyhow::Result;
use tracing::warn;

use crate::cli::prompt;
use crate::config::Config;
use crate::db::Store;
use crate::models::Account;
use crate::services::{
    AccountService, AuthError, AuthService, Authenticated, SeaOrmAccountService,
    SeaOrmAuthService, SeaOrmCatalogService, SeaOrmWorkflowService,
};

pub struct App {
    pub config: Config,
    pub store: Store,
    pub auth: SeaOrmAuthService,
    pub accounts: SeaOrmAccountService,
    pub workflow: SeaOrmWorkflowService,
    pub catalog: SeaOrmCatalogService,
}

impl App {
    /// Connects, migrates and makes sure an administrator exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let store = Store::connect(&config.database).await?;

        let app = Self {
            config: config.clone(),
            auth: SeaOrmAuthService::new(store.clone(), config.security.clone()),
            accounts: SeaOrmAccountService::new(store.clone(), config.security.clone()),
            workflow: SeaOrmWorkflowService::new(store.clone()),
            catalog: SeaOrmCatalogService::new(store.clone()),
            store,
        };

        if let Some(admin) = app
            .accounts
            .ensure_default_admin(&app.config.security.bootstrap_admin)
            .await?
        {
            println!(
                "Created default administrator '{}' with the configured bootstrap password.",
                admin.username
            );
            println!("Change it with: degrow --user {} passwd", admin.username);
        }

        Ok(app)
    }

    /// Signs in for a single command. Username is prompted for when not given.
    pub async fn login(&self, user: Option<&str>) -> Result<Authenticated> {
        let identifier = match user {
            Some(user) => user.to_string(),
            None => prompt::prompt("Username or email: ")?,
        };
        let password = prompt::password_from_env_or_prompt("Password: ")?;

        let authenticated = self
            .auth
            .authenticate(&identifier, &password, Some("cli"))
            .await
            .map_err(describe_login_error)?;

        if authenticated.account.must_change_password {
            warn!(
                username = %authenticated.account.username,
                "Password change required"
            );
            println!(
                "Your password must be changed before other commands run. Run: degrow --user {} passwd",
                authenticated.account.username
            );
        }

        Ok(authenticated)
    }

    /// Ends a session, logging rather than failing when that does not work.
    pub async fn logout(&self, token: &str) {
        if let Err(e) = self.auth.logout(token).await {
            warn!(error = %e, "Failed to end session");
        }
    }

    pub async fn find_account(&self, username: &str) -> Result<Account> {
        Ok(self.accounts.get_by_username(username).await?)
    }
}

/// Uniform wording for failed sign-ins so unknown usernames are not revealed.
pub fn describe_login_error(err: AuthError) -> anyhow::Error {
    match err {
        AuthError::AccountNotFound | AuthError::InvalidCredentials => {
            anyhow::anyhow!("Invalid username or password")
        }
        AuthError::AccountLocked { until } => anyhow::anyhow!(
            "Account locked after too many failed attempts. Try again after {}",
            until.format("%Y-%m-%d %H:%M UTC")
        ),
        AuthError::AccountSuspended { reason, until } => match until {
            Some(until) => anyhow::anyhow!(
                "Account suspended until {}: {reason}",
                until.format("%Y-%m-%d %H:%M UTC")
            ),
            None => anyhow::anyhow!("Account suspended: {reason}"),
        },
        AuthError::AccountInactive => {
            anyhow::anyhow!("Account is deactivated. Contact an administrator")
        }
        other => other.into(),
    }
}
