//! Audit trail command handler

use anyhow::Result;
use std::collections::HashMap;

use crate::cli::App;
use crate::db::AuditFilter;
use crate::models::{Account, Role};
use crate::services::{AccountService, authorize};

pub async fn cmd_audit(
    app: &App,
    actor: &Account,
    account: Option<&str>,
    action: Option<&str>,
    limit: u64,
) -> Result<()> {
    // Anyone may read their own trail; the full log is for administrators.
    let account_id = match account {
        Some(username) if username == actor.username => Some(actor.id),
        Some(username) => {
            authorize(actor, Role::Admin)?;
            Some(app.find_account(username).await?.id)
        }
        None => {
            authorize(actor, Role::Admin)?;
            None
        }
    };

    let entries = app
        .store
        .audit()
        .list(&AuditFilter {
            account_id,
            action: action.map(str::to_string),
            since: None,
            limit: Some(limit),
        })
        .await?;

    if entries.is_empty() {
        println!("No audit entries.");
        return Ok(());
    }

    let names: HashMap<i32, String> = app
        .accounts
        .list_accounts(&Default::default())
        .await?
        .into_iter()
        .map(|a| (a.id, a.username))
        .collect();

    println!("Audit log ({} entries)", entries.len());
    println!("{:-<100}", "");

    for entry in entries {
        let who = names
            .get(&entry.account_id)
            .cloned()
            .unwrap_or_else(|| format!("#{}", entry.account_id));
        println!(
            "{} {:<16} {:<18} {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            who,
            entry.action,
            entry.description
        );
    }

    Ok(())
}
