//! Account administration command handlers

use anyhow::Result;

use crate::cli::{App, prompt};
use crate::db::AccountFilter;
use crate::models::{Account, Role, parse_date};
use crate::services::{AccountService, AuthService, CreateAccountRequest, authorize};

fn format_time(value: Option<chrono::DateTime<chrono::Utc>>) -> String {
    value.map_or_else(
        || "never".to_string(),
        |t| t.format("%Y-%m-%d %H:%M").to_string(),
    )
}

/// Only a super admin may create, promote to or manage super admins.
fn check_role_grant(actor: &Account, role: Role) -> Result<()> {
    if role == Role::SuperAdmin {
        authorize(actor, Role::SuperAdmin)?;
    }
    Ok(())
}

fn check_target(actor: &Account, target: &Account) -> Result<()> {
    if target.role() == Some(Role::SuperAdmin) {
        authorize(actor, Role::SuperAdmin)?;
    }
    Ok(())
}

pub async fn cmd_user_add(
    app: &App,
    actor: &Account,
    username: &str,
    email: &str,
    role: &str,
    must_change_password: bool,
) -> Result<()> {
    authorize(actor, Role::Admin)?;
    let role: Role = role.parse()?;
    check_role_grant(actor, role)?;

    let password = prompt::new_password("Initial password")?;

    let account = app
        .accounts
        .create_account(
            CreateAccountRequest {
                username: username.to_string(),
                email: email.to_string(),
                password,
                role,
                must_change_password,
            },
            Some(actor.id),
        )
        .await?;

    println!(
        "✓ Created account {} <{}> with role {}",
        account.username, account.email, account.role
    );
    Ok(())
}

pub async fn cmd_user_list(
    app: &App,
    actor: &Account,
    role: Option<&str>,
    active: Option<bool>,
    search: Option<&str>,
) -> Result<()> {
    authorize(actor, Role::Admin)?;

    let role = role.map(str::parse::<Role>).transpose()?;
    let filter = AccountFilter {
        role: role.map(|r| r.as_str().to_string()),
        active,
        search: search.map(str::to_string),
    };

    let accounts = app.accounts.list_accounts(&filter).await?;
    if accounts.is_empty() {
        println!("No accounts match.");
        return Ok(());
    }

    let now = chrono::Utc::now();
    println!("Accounts ({} total)", accounts.len());
    println!("{:-<90}", "");
    println!(
        "{:<20} {:<32} {:<12} {:<9} {:<16}",
        "Username", "Email", "Role", "State", "Last login"
    );
    println!("{:-<90}", "");

    for account in accounts {
        let state = if !account.is_active {
            "inactive"
        } else if account.is_suspended(now) {
            "suspended"
        } else if account.is_locked(now) {
            "locked"
        } else {
            "active"
        };
        println!(
            "{:<20} {:<32} {:<12} {:<9} {:<16}",
            account.username,
            account.email,
            account.role,
            state,
            format_time(account.last_login_at)
        );
    }

    Ok(())
}

pub async fn cmd_user_show(app: &App, actor: &Account, username: &str) -> Result<()> {
    if actor.username != username {
        authorize(actor, Role::Admin)?;
    }

    let account = app.find_account(username).await?;
    let sessions = app.accounts.sessions(account.id).await?;

    println!("{} <{}>", account.username, account.email);
    println!("{:-<70}", "");
    println!("  ID:               {}", account.id);
    println!("  Role:             {}", account.role);
    println!("  Active:           {}", account.is_active);
    println!("  Failed attempts:  {}", account.failed_login_attempts);
    println!("  Locked until:     {}", format_time(account.locked_until));
    println!("  Last login:       {}", format_time(account.last_login_at));
    println!(
        "  Password changed: {}",
        format_time(account.password_changed_at)
    );
    if account.is_suspended(chrono::Utc::now()) {
        println!(
            "  Suspended:        {} (until {})",
            account.suspension_reason.as_deref().unwrap_or("-"),
            account
                .suspended_until
                .map_or_else(|| "lifted".to_string(), |t| t.format("%Y-%m-%d").to_string())
        );
    }
    if account.must_change_password {
        println!("  Password change required at next login");
    }

    println!();
    println!("Recent sessions:");
    for session in sessions.iter().take(10) {
        let state = if session.is_active { "active" } else { "ended" };
        println!(
            "  {} {:<6} from {} (last activity {})",
            session.login_at.format("%Y-%m-%d %H:%M"),
            state,
            session.client_address.as_deref().unwrap_or("-"),
            session.last_activity_at.format("%Y-%m-%d %H:%M")
        );
    }
    if sessions.is_empty() {
        println!("  (none)");
    }

    Ok(())
}

pub async fn cmd_user_role(app: &App, actor: &Account, username: &str, role: &str) -> Result<()> {
    authorize(actor, Role::Admin)?;
    let role: Role = role.parse()?;
    check_role_grant(actor, role)?;

    let target = app.find_account(username).await?;
    check_target(actor, &target)?;

    let updated = app.accounts.update_role(target.id, role, actor.id).await?;
    println!("✓ {} is now {}", updated.username, updated.role);
    Ok(())
}

pub async fn cmd_user_set_active(
    app: &App,
    actor: &Account,
    username: &str,
    active: bool,
) -> Result<()> {
    authorize(actor, Role::Admin)?;
    let target = app.find_account(username).await?;
    check_target(actor, &target)?;

    let updated = app.accounts.set_active(target.id, active, actor.id).await?;
    if updated.is_active {
        println!("✓ Activated {}", updated.username);
    } else {
        println!("✓ Deactivated {} and ended its sessions", updated.username);
    }
    Ok(())
}

pub async fn cmd_user_unlock(app: &App, actor: &Account, username: &str) -> Result<()> {
    authorize(actor, Role::Admin)?;
    let target = app.find_account(username).await?;

    let updated = app.accounts.unlock(target.id, actor.id).await?;
    println!("✓ Unlocked {}", updated.username);
    Ok(())
}

/// `until` is the last day of the suspension; it ends at the following midnight UTC.
pub async fn cmd_user_suspend(
    app: &App,
    actor: &Account,
    username: &str,
    reason: &str,
    until: Option<&str>,
) -> Result<()> {
    authorize(actor, Role::Admin)?;
    let target = app.find_account(username).await?;
    check_target(actor, &target)?;

    let until = until
        .map(|raw| -> Result<_> {
            let last_day = parse_date(raw)?;
            let end = last_day
                .succ_opt()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(|| anyhow::anyhow!("Suspension end date out of range: {raw}"))?;
            Ok(end.and_utc())
        })
        .transpose()?;

    let updated = app
        .accounts
        .suspend(target.id, reason, until, actor.id)
        .await?;
    match updated.suspended_until {
        Some(end) => println!(
            "✓ Suspended {} until {} and ended its sessions",
            updated.username,
            end.format("%Y-%m-%d %H:%M UTC")
        ),
        None => println!(
            "✓ Suspended {} until lifted and ended its sessions",
            updated.username
        ),
    }
    Ok(())
}

pub async fn cmd_user_unsuspend(app: &App, actor: &Account, username: &str) -> Result<()> {
    authorize(actor, Role::Admin)?;
    let target = app.find_account(username).await?;
    check_target(actor, &target)?;

    let updated = app.accounts.lift_suspension(target.id, actor.id).await?;
    println!("✓ Lifted the suspension of {}", updated.username);
    Ok(())
}

pub async fn cmd_user_reset_password(app: &App, actor: &Account, username: &str) -> Result<()> {
    authorize(actor, Role::Admin)?;
    let target = app.find_account(username).await?;
    check_target(actor, &target)?;

    let password = prompt::new_password(&format!("New password for {}", target.username))?;
    app.accounts
        .reset_password(target.id, &password, actor.id)
        .await?;

    println!(
        "✓ Password reset. {} must change it at next login.",
        target.username
    );
    Ok(())
}

pub async fn cmd_user_delete(app: &App, actor: &Account, username: &str, yes: bool) -> Result<()> {
    authorize(actor, Role::SuperAdmin)?;
    let target = app.find_account(username).await?;

    if !yes && !prompt::confirm(&format!("Delete account {}?", target.username))? {
        println!("Cancelled.");
        return Ok(());
    }

    app.accounts.delete_account(target.id, actor.id).await?;
    println!("✓ Deleted {}", target.username);
    Ok(())
}

pub async fn cmd_user_stats(app: &App, actor: &Account) -> Result<()> {
    authorize(actor, Role::Admin)?;
    let stats = app.accounts.statistics().await?;

    println!("Account statistics");
    println!("{:-<70}", "");
    println!("  Total:            {}", stats.total);
    println!("  Active:           {}", stats.active);
    println!("  Inactive:         {}", stats.inactive);
    println!("  Locked:           {}", stats.locked);
    println!("  Suspended:        {}", stats.suspended);
    println!("  Active sessions:  {}", stats.active_sessions);
    println!();
    println!("By role:");
    for (role, count) in &stats.by_role {
        println!("  {role:<16} {count}");
    }

    Ok(())
}

/// Changes the signed-in user's own password.
pub async fn cmd_passwd(app: &App, actor: &Account) -> Result<()> {
    let current = prompt::prompt_password("Current password: ")?;
    let new = prompt::new_password("New password")?;

    app.auth.change_password(actor.id, &current, &new).await?;
    println!("✓ Password changed");
    Ok(())
}
