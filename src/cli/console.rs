//! Interactive text console: sign in once, then pick operations from a menu.

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::commands::{
    cmd_audit, cmd_entry_list, cmd_gantt, cmd_milestone_list, cmd_passwd, cmd_progress,
    cmd_report, cmd_schedule_show, cmd_user_list, cmd_user_stats, print_progress,
};
use crate::cli::context::describe_login_error;
use crate::cli::{App, prompt};
use crate::models::{Account, Role, WorkflowStatus, parse_optional_date};
use crate::schedule::iso_week_of;
use crate::services::{
    AuthService, Authenticated, CatalogService, NewWorkflowEntry, WorkflowService, authorize,
};

const MAX_LOGIN_ATTEMPTS: usize = 3;

const MENU: [(&str, &str); 11] = [
    ("1", "Record a workflow entry"),
    ("2", "Site progress"),
    ("3", "Recent entries"),
    ("4", "Site schedules"),
    ("5", "Weekly Gantt chart"),
    ("6", "Milestone catalog"),
    ("7", "Change password"),
    ("8", "Accounts (admin)"),
    ("9", "Audit trail"),
    ("r", "Workflow report"),
    ("0", "Log out and exit"),
];

pub async fn run(app: &App) -> Result<()> {
    println!("{:=<60}", "");
    println!("  Degrow workflow tracker");
    println!("{:=<60}", "");
    println!();

    let Some(session) = sign_in(app).await? else {
        println!("Too many failed attempts, exiting.");
        return Ok(());
    };
    let token = session.session.token.clone();

    let result = menu_loop(app, session).await;
    app.logout(&token).await;
    println!("Signed out.");
    result
}

async fn sign_in(app: &App) -> Result<Option<Authenticated>> {
    for attempt in 1..=MAX_LOGIN_ATTEMPTS {
        let identifier = prompt::prompt("Username or email: ")?;
        let password = prompt::prompt_password("Password: ")?;

        match app
            .auth
            .authenticate(&identifier, &password, Some("console"))
            .await
        {
            Ok(authenticated) => {
                println!();
                println!(
                    "Welcome, {} ({})",
                    authenticated.account.username,
                    authenticated.account.role
                );
                return Ok(Some(authenticated));
            }
            Err(e) => {
                println!("✗ {}", describe_login_error(e));
                if attempt < MAX_LOGIN_ATTEMPTS {
                    println!("{} attempt(s) left", MAX_LOGIN_ATTEMPTS - attempt);
                }
                println!();
            }
        }
    }
    Ok(None)
}

async fn menu_loop(app: &App, session: Authenticated) -> Result<()> {
    let token = session.session.token;

    if session.account.must_change_password {
        println!("Your password must be changed before continuing.");
        if let Err(e) = cmd_passwd(app, &session.account).await {
            println!("✗ {e}");
        }
    }

    loop {
        println!();
        for (key, label) in MENU {
            println!("  {key}. {label}");
        }
        let choice = prompt::prompt("Select an option: ")?;
        println!();

        if choice == "0" {
            return Ok(());
        }

        // Picks up role changes and deactivation made from elsewhere.
        let actor = match app.auth.validate_session(&token).await {
            Ok(account) => account,
            Err(e) => {
                warn!(error = %e, "Console session no longer valid");
                println!("✗ Session ended: {e}");
                return Ok(());
            }
        };

        if actor.must_change_password && choice != "7" {
            println!("✗ Your password was reset. Change it first (option 7).");
            continue;
        }

        let outcome = match choice.as_str() {
            "1" => record_entry(app, &actor).await,
            "2" => site_progress(app, &actor).await,
            "3" => cmd_entry_list(app, &actor, None, None, None, 25).await,
            "4" => cmd_schedule_show(app, &actor, None).await,
            "5" => gantt(app, &actor).await,
            "6" => cmd_milestone_list(app, &actor).await,
            "7" => cmd_passwd(app, &actor).await,
            "8" => accounts(app, &actor).await,
            "9" => audit(app, &actor).await,
            "r" | "R" => cmd_report(app, &actor, false).await,
            other => {
                println!("Unknown option: {other}");
                Ok(())
            }
        };

        if let Err(e) = outcome {
            println!("✗ {e}");
        }
    }
}

async fn record_entry(app: &App, actor: &Account) -> Result<()> {
    authorize(actor, Role::User)?;

    let catalog = app.catalog.list_milestones().await?;
    if catalog.is_empty() {
        println!("The milestone catalog is empty.");
        return Ok(());
    }

    let site_code = prompt::prompt("Site CLLI code: ")?;
    if site_code.is_empty() {
        println!("Cancelled.");
        return Ok(());
    }
    let state = prompt::prompt("State: ")?;
    let host_wire_centre = prompt::prompt_optional("Host wire centre (optional): ")?;
    let lata = prompt::prompt_optional("LATA (optional): ")?;
    let equipment_type = prompt::prompt_optional("Equipment type (optional): ")?;

    let names: Vec<String> = catalog.iter().map(|m| m.name.clone()).collect();
    let Some(index) = prompt::choose("Milestone (blank to cancel):", &names)? else {
        println!("Cancelled.");
        return Ok(());
    };
    let milestone = &catalog[index];

    let subtask = if milestone.subtasks.is_empty() {
        None
    } else {
        let names: Vec<String> = milestone.subtasks.iter().map(|s| s.name.clone()).collect();
        prompt::choose("Subtask (blank for the milestone itself):", &names)?
            .map(|i| names[i].clone())
    };

    let statuses: Vec<String> = WorkflowStatus::ALL
        .iter()
        .map(|s| s.as_str().to_string())
        .collect();
    let status = prompt::choose("Status (blank for To Do):", &statuses)?
        .map_or(WorkflowStatus::ToDo, |i| WorkflowStatus::ALL[i]);

    println!("Dates are YYYY-MM-DD or MM/DD/YYYY, blank to skip.");
    let entry = NewWorkflowEntry {
        site_code,
        state,
        host_wire_centre,
        lata,
        equipment_type,
        milestone: milestone.name.clone(),
        subtask,
        status: Some(status),
        planned_start: read_date("Planned start: ")?,
        planned_end: read_date("Planned end: ")?,
        actual_start: read_date("Actual start: ")?,
        actual_end: read_date("Actual end: ")?,
        notes: prompt::prompt_optional("Notes (optional): ")?,
    };

    println!();
    println!("{:-<60}", "");
    println!("Site:      {}", entry.site_code.trim().to_uppercase());
    println!("Milestone: {}", entry.milestone);
    if let Some(subtask) = &entry.subtask {
        println!("Subtask:   {subtask}");
    }
    println!("Status:    {status}");
    println!("{:-<60}", "");

    if !prompt::confirm("Save this entry?")? {
        println!("Discarded.");
        return Ok(());
    }

    let saved = app.workflow.record_entry(entry, Some(actor.id)).await?;
    info!(entry_id = saved.id, site = %saved.site_code, "Entry recorded from console");
    println!("✓ Recorded entry #{}", saved.id);
    Ok(())
}

fn read_date(label: &str) -> Result<Option<chrono::NaiveDate>> {
    loop {
        let raw = prompt::prompt_optional(label)?;
        match parse_optional_date(raw.as_deref()) {
            Ok(date) => return Ok(date),
            Err(e) => println!("✗ {e}"),
        }
    }
}

async fn site_progress(app: &App, actor: &Account) -> Result<()> {
    match prompt::prompt_optional("Site code (blank for all sites): ")? {
        Some(site) => {
            authorize(actor, Role::Guest)?;
            let progress = app.workflow.site_progress(&site).await?;
            print_progress(&progress);
            Ok(())
        }
        None => cmd_progress(app, actor, None).await,
    }
}

async fn gantt(app: &App, actor: &Account) -> Result<()> {
    let (year, week) = iso_week_of(Utc::now().date_naive());
    let raw = prompt::prompt_optional(&format!("ISO week [{year}-W{week:02}]: "))?;

    let (year, week) = match raw {
        None => (year, week),
        Some(raw) => parse_week(&raw).ok_or_else(|| {
            anyhow::anyhow!("Expected a week number or YEAR-WNN, got '{raw}'")
        })?,
    };
    cmd_gantt(app, actor, Some(year), Some(week)).await
}

/// Accepts `NN`, `YYYY-WNN` or `YYYY-NN`. A bare week uses the current year.
fn parse_week(raw: &str) -> Option<(i32, u32)> {
    let raw = raw.trim();
    match raw.split_once('-') {
        Some((year, week)) => {
            let week = week.trim_start_matches(['W', 'w']);
            Some((year.parse().ok()?, week.parse().ok()?))
        }
        None => {
            let (year, _) = iso_week_of(Utc::now().date_naive());
            Some((year, raw.parse().ok()?))
        }
    }
}

async fn accounts(app: &App, actor: &Account) -> Result<()> {
    authorize(actor, Role::Admin)?;
    cmd_user_stats(app, actor).await?;
    println!();
    cmd_user_list(app, actor, None, None, None).await
}

async fn audit(app: &App, actor: &Account) -> Result<()> {
    // Non-admins only see their own trail.
    if actor.has_permission(Role::Admin) {
        cmd_audit(app, actor, None, None, 50).await
    } else {
        cmd_audit(app, actor, Some(&actor.username), None, 50).await
    }
}

#[cfg(test)]
mod tests {
    use super::parse_week;

    #[test]
    fn test_parse_week_forms() {
        assert_eq!(parse_week("2025-W09"), Some((2025, 9)));
        assert_eq!(parse_week("2025-12"), Some((2025, 12)));
        assert_eq!(parse_week("abc"), None);
        assert_eq!(parse_week("2025-Wx"), None);
        assert!(matches!(parse_week("7"), Some((_, 7))));
    }
}
