mod audit;
mod catalog;
mod db;
mod entry;
mod init;
mod schedule;
mod user;

pub use audit::cmd_audit;
pub use catalog::{
    cmd_milestone_add, cmd_milestone_delete, cmd_milestone_describe, cmd_milestone_list,
    cmd_milestone_move, cmd_milestone_rename, cmd_milestone_show, cmd_subtask_add,
    cmd_subtask_criticality, cmd_subtask_delete, cmd_subtask_move, cmd_subtask_update,
};
pub use db::{cmd_db_backup, cmd_db_restore, cmd_db_stats, default_backup_path};
pub use entry::{
    cmd_entry_add, cmd_entry_export, cmd_entry_list, cmd_entry_status, cmd_progress, cmd_report,
    print_progress,
};
pub use init::cmd_init;
pub use schedule::{cmd_gantt, cmd_schedule_set, cmd_schedule_show};
pub use user::{
    cmd_passwd, cmd_user_add, cmd_user_delete, cmd_user_list, cmd_user_reset_password,
    cmd_user_role, cmd_user_set_active, cmd_user_show, cmd_user_stats, cmd_user_suspend,
    cmd_user_unlock, cmd_user_unsuspend,
};

use anyhow::Result;

use crate::cli::{
    App, Commands, DbCommands, EntryCommands, MilestoneCommands, ScheduleCommands,
    SubtaskCommands, UserCommands,
};
use crate::models::Account;
use crate::services::SubtaskUpdate;

/// Only `passwd` may run while the account still has to replace its password.
pub fn ensure_password_current(actor: &Account, command: &Commands) -> Result<()> {
    if actor.must_change_password && !matches!(command, Commands::Passwd) {
        anyhow::bail!(
            "Password change required before any other command. Run: degrow --user {} passwd",
            actor.username
        );
    }
    Ok(())
}

/// Runs one signed-in command. `Init` and `Console` are handled by the caller.
pub async fn dispatch(app: &App, actor: &Account, command: Commands) -> Result<()> {
    ensure_password_current(actor, &command)?;

    match command {
        Commands::Init { .. } | Commands::Console => {
            anyhow::bail!("init and console are not signed-in commands")
        }

        Commands::User { command } => match command {
            UserCommands::Add {
                username,
                email,
                role,
                no_password_change,
            } => cmd_user_add(app, actor, &username, &email, &role, !no_password_change).await,
            UserCommands::List {
                role,
                active,
                inactive,
                search,
            } => {
                let active = match (active, inactive) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                };
                cmd_user_list(app, actor, role.as_deref(), active, search.as_deref()).await
            }
            UserCommands::Show { username } => cmd_user_show(app, actor, &username).await,
            UserCommands::Role { username, role } => {
                cmd_user_role(app, actor, &username, &role).await
            }
            UserCommands::Activate { username } => {
                cmd_user_set_active(app, actor, &username, true).await
            }
            UserCommands::Deactivate { username } => {
                cmd_user_set_active(app, actor, &username, false).await
            }
            UserCommands::Unlock { username } => cmd_user_unlock(app, actor, &username).await,
            UserCommands::Suspend {
                username,
                reason,
                until,
            } => cmd_user_suspend(app, actor, &username, &reason, until.as_deref()).await,
            UserCommands::Unsuspend { username } => {
                cmd_user_unsuspend(app, actor, &username).await
            }
            UserCommands::ResetPassword { username } => {
                cmd_user_reset_password(app, actor, &username).await
            }
            UserCommands::Delete { username, yes } => {
                cmd_user_delete(app, actor, &username, yes).await
            }
            UserCommands::Stats => cmd_user_stats(app, actor).await,
        },

        Commands::Passwd => cmd_passwd(app, actor).await,

        Commands::Audit {
            account,
            action,
            limit,
        } => cmd_audit(app, actor, account.as_deref(), action.as_deref(), limit).await,

        Commands::Entry { command } => match command {
            EntryCommands::Add(args) => cmd_entry_add(app, actor, args).await,
            EntryCommands::List {
                site,
                milestone,
                status,
                limit,
            } => {
                cmd_entry_list(
                    app,
                    actor,
                    site.as_deref(),
                    milestone.as_deref(),
                    status.as_deref(),
                    limit,
                )
                .await
            }
            EntryCommands::Export {
                site,
                milestone,
                status,
                output,
            } => {
                cmd_entry_export(
                    app,
                    actor,
                    site.as_deref(),
                    milestone.as_deref(),
                    status.as_deref(),
                    output.as_deref(),
                )
                .await
            }
            EntryCommands::Status {
                milestone,
                subtask,
                site,
            } => {
                cmd_entry_status(app, actor, &milestone, subtask.as_deref(), site.as_deref())
                    .await
            }
        },

        Commands::Progress { site } => cmd_progress(app, actor, site.as_deref()).await,

        Commands::Milestone { command } => match command {
            MilestoneCommands::List => cmd_milestone_list(app, actor).await,
            MilestoneCommands::Show { name } => cmd_milestone_show(app, actor, &name).await,
            MilestoneCommands::Add { name, description } => {
                cmd_milestone_add(app, actor, &name, description).await
            }
            MilestoneCommands::Rename { name, new_name } => {
                cmd_milestone_rename(app, actor, &name, &new_name).await
            }
            MilestoneCommands::Describe { name, description } => {
                cmd_milestone_describe(app, actor, &name, description).await
            }
            MilestoneCommands::Delete { name, yes } => {
                cmd_milestone_delete(app, actor, &name, yes).await
            }
            MilestoneCommands::Move { name, direction } => {
                cmd_milestone_move(app, actor, &name, &direction).await
            }
        },

        Commands::Subtask { command } => match command {
            SubtaskCommands::Add {
                milestone,
                name,
                criticality,
                description,
            } => cmd_subtask_add(app, actor, &milestone, &name, &criticality, description).await,
            SubtaskCommands::Rename {
                milestone,
                name,
                new_name,
            } => {
                let update = SubtaskUpdate {
                    name: Some(new_name),
                    ..SubtaskUpdate::default()
                };
                cmd_subtask_update(app, actor, &milestone, &name, update).await
            }
            SubtaskCommands::Describe {
                milestone,
                name,
                description,
            } => {
                let update = SubtaskUpdate {
                    description: Some(description),
                    ..SubtaskUpdate::default()
                };
                cmd_subtask_update(app, actor, &milestone, &name, update).await
            }
            SubtaskCommands::Criticality {
                milestone,
                name,
                criticality,
            } => cmd_subtask_criticality(app, actor, &milestone, &name, &criticality).await,
            SubtaskCommands::Delete {
                milestone,
                name,
                yes,
            } => cmd_subtask_delete(app, actor, &milestone, &name, yes).await,
            SubtaskCommands::Move {
                milestone,
                name,
                direction,
            } => cmd_subtask_move(app, actor, &milestone, &name, &direction).await,
        },

        Commands::Schedule { command } => match command {
            ScheduleCommands::Set { site, start, end } => {
                cmd_schedule_set(app, actor, &site, &start, &end).await
            }
            ScheduleCommands::Show { site } => {
                cmd_schedule_show(app, actor, site.as_deref()).await
            }
        },

        Commands::Gantt { year, week } => cmd_gantt(app, actor, year, week).await,

        Commands::Report { json } => cmd_report(app, actor, json).await,

        Commands::Db { command } => match command {
            DbCommands::Stats => cmd_db_stats(app, actor).await,
            DbCommands::Backup { output } => cmd_db_backup(app, actor, output).await,
            DbCommands::Restore { input, yes } => cmd_db_restore(app, actor, &input, yes).await,
        },
    }
}
