//! CLI module - Command-line interface for the degrow workflow tracker
//!
//! This module provides a structured CLI using clap for argument parsing.

pub mod commands;
pub mod console;
pub mod context;
pub mod prompt;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub use context::App;

/// Degrow workflow tracker
/// Tracks per-site decommissioning progress through milestones and subtasks
#[derive(Parser)]
#[command(name = "degrow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (JSON or TOML). Defaults to the first config.json found
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Run the interactive text console
    #[arg(long)]
    pub console: bool,

    /// Username or email to sign in as. The password is read from
    /// DEGROW_PASSWORD or prompted for
    #[arg(long, short = 'u', global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a default config file and initialise the database
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Interactive login and menu
    #[command(alias = "c")]
    Console,

    /// Manage user accounts
    #[command(alias = "users")]
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Change your own password
    Passwd,

    /// Show the audit trail
    Audit {
        /// Only entries for this username
        #[arg(long)]
        account: Option<String>,
        /// Only this action (login, login_failed, logout, ...)
        #[arg(long)]
        action: Option<String>,
        /// Number of entries to show
        #[arg(long, default_value = "50")]
        limit: u64,
    },

    /// Record and query workflow entries
    #[command(alias = "e")]
    Entry {
        #[command(subcommand)]
        command: EntryCommands,
    },

    /// Show milestone progress for a site, or a summary of all sites
    #[command(alias = "p")]
    Progress {
        /// CLLI site code
        site: Option<String>,
    },

    /// Manage milestones
    #[command(alias = "m")]
    Milestone {
        #[command(subcommand)]
        command: MilestoneCommands,
    },

    /// Manage subtasks of a milestone
    Subtask {
        #[command(subcommand)]
        command: SubtaskCommands,
    },

    /// Planned date window per site
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommands,
    },

    /// Weekly Gantt chart of the latest entry per site and milestone
    #[command(alias = "g")]
    Gantt {
        /// ISO year (defaults to the current one)
        #[arg(long)]
        year: Option<i32>,
        /// ISO week number (defaults to the current one)
        #[arg(long)]
        week: Option<u32>,
    },

    /// Progress of every site, status totals and overdue milestones
    Report {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create an account
    Add {
        username: String,
        email: String,
        /// guest, user, supervisor, manager, admin or super_admin
        #[arg(long, default_value = "user")]
        role: String,
        /// Let the owner keep the initial password
        #[arg(long)]
        no_password_change: bool,
    },
    /// List accounts
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        role: Option<String>,
        /// Only active accounts
        #[arg(long, conflicts_with = "inactive")]
        active: bool,
        /// Only inactive accounts
        #[arg(long)]
        inactive: bool,
        /// Substring of username or email
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one account with its sessions
    Show { username: String },
    /// Change the role of an account
    Role { username: String, role: String },
    /// Allow an account to sign in again
    Activate { username: String },
    /// Block an account and end its sessions
    Deactivate { username: String },
    /// Clear a lockout after failed logins
    Unlock { username: String },
    /// Suspend an account with a reason, optionally until a date
    Suspend {
        username: String,
        #[arg(long)]
        reason: String,
        /// Last day of the suspension (YYYY-MM-DD); open-ended when omitted
        #[arg(long)]
        until: Option<String>,
    },
    /// Lift a suspension
    Unsuspend { username: String },
    /// Set a new password that must be changed at next login
    ResetPassword { username: String },
    /// Delete an account
    #[command(alias = "rm")]
    Delete {
        username: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Account statistics
    Stats,
}

#[derive(Args, Clone, Default)]
pub struct EntryArgs {
    /// CLLI site code
    pub site: String,
    #[arg(long)]
    pub milestone: String,
    #[arg(long)]
    pub subtask: Option<String>,
    /// To Do, In Progress, Blocked or Done
    #[arg(long, default_value = "To Do")]
    pub status: String,
    #[arg(long, default_value = "")]
    pub state: String,
    #[arg(long)]
    pub host_wire_centre: Option<String>,
    #[arg(long)]
    pub lata: Option<String>,
    #[arg(long)]
    pub equipment_type: Option<String>,
    /// YYYY-MM-DD or MM/DD/YYYY
    #[arg(long)]
    pub planned_start: Option<String>,
    #[arg(long)]
    pub planned_end: Option<String>,
    #[arg(long)]
    pub actual_start: Option<String>,
    #[arg(long)]
    pub actual_end: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Subcommand)]
pub enum EntryCommands {
    /// Record a status update
    #[command(alias = "a")]
    Add(EntryArgs),
    /// List entries, newest first
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        site: Option<String>,
        #[arg(long)]
        milestone: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value = "25")]
        limit: u64,
    },
    /// Write entries as CSV to a file or stdout
    Export {
        #[arg(long)]
        site: Option<String>,
        #[arg(long)]
        milestone: Option<String>,
        #[arg(long)]
        status: Option<String>,
        /// Target file; stdout when omitted
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Current status of a milestone or subtask
    Status {
        milestone: String,
        #[arg(long)]
        subtask: Option<String>,
        #[arg(long)]
        site: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum MilestoneCommands {
    /// List milestones in order with their subtasks
    #[command(alias = "ls")]
    List,
    /// Show one milestone
    Show { name: String },
    /// Append a milestone
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Rename a milestone; recorded entries follow
    Rename { name: String, new_name: String },
    /// Set or clear the description
    Describe {
        name: String,
        description: Option<String>,
    },
    /// Delete a milestone and its subtasks
    #[command(alias = "rm")]
    Delete {
        name: String,
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Move one place up or down
    Move { name: String, direction: String },
}

#[derive(Subcommand)]
pub enum SubtaskCommands {
    /// Add a subtask to a milestone
    Add {
        milestone: String,
        name: String,
        /// must, should or none
        #[arg(long, default_value = "should")]
        criticality: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Rename a subtask; recorded entries follow
    Rename {
        milestone: String,
        name: String,
        new_name: String,
    },
    /// Set or clear the description
    Describe {
        milestone: String,
        name: String,
        description: Option<String>,
    },
    /// Change the criticality (must, should or none)
    Criticality {
        milestone: String,
        name: String,
        criticality: String,
    },
    /// Delete a subtask
    #[command(alias = "rm")]
    Delete {
        milestone: String,
        name: String,
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Move one place up or down
    Move {
        milestone: String,
        name: String,
        direction: String,
    },
}

#[derive(Subcommand)]
pub enum ScheduleCommands {
    /// Set the planned window of a site
    Set {
        site: String,
        start: String,
        end: String,
    },
    /// Show one site's window, or all of them
    Show { site: Option<String> },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Connection check and row counts
    Stats,
    /// Copy the SQLite database to the backup location
    Backup {
        /// Target file; defaults to a timestamped file under backup.location
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replace every table with the contents of a SQLite backup file
    Restore {
        input: PathBuf,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_entry_add() {
        let cli = Cli::try_parse_from([
            "degrow",
            "--user",
            "alice",
            "entry",
            "add",
            "DLLSTXCF",
            "--milestone",
            "Restrict CM",
            "--status",
            "Done",
        ])
        .unwrap();

        assert_eq!(cli.user.as_deref(), Some("alice"));
        match cli.command {
            Some(Commands::Entry {
                command: EntryCommands::Add(args),
            }) => {
                assert_eq!(args.site, "DLLSTXCF");
                assert_eq!(args.milestone, "Restrict CM");
                assert_eq!(args.status, "Done");
            }
            _ => panic!("expected entry add"),
        }
    }

    #[test]
    fn test_parse_user_suspend() {
        let cli = Cli::try_parse_from([
            "degrow", "user", "suspend", "bob", "--reason", "Audit", "--until", "2025-04-01",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::User {
                command:
                    UserCommands::Suspend {
                        username,
                        reason,
                        until,
                    },
            }) => {
                assert_eq!(username, "bob");
                assert_eq!(reason, "Audit");
                assert_eq!(until.as_deref(), Some("2025-04-01"));
            }
            _ => panic!("expected user suspend"),
        }
    }

    #[test]
    fn test_suspend_requires_reason() {
        assert!(Cli::try_parse_from(["degrow", "user", "suspend", "bob"]).is_err());
    }

    #[test]
    fn test_console_flag() {
        let cli = Cli::try_parse_from(["degrow", "--console"]).unwrap();
        assert!(cli.console);
        assert!(cli.command.is_none());
    }
}
