//! Database maintenance command handlers

use anyhow::Result;
use chrono::Utc;
use sea_orm::DatabaseBackend;
use std::path::{Path, PathBuf};

use crate::cli::{App, prompt};
use crate::models::{Account, Role};
use crate::services::authorize;

pub async fn cmd_db_stats(app: &App, actor: &Account) -> Result<()> {
    authorize(actor, Role::Admin)?;

    app.store.ping().await?;
    let counts = app.store.table_counts().await?;

    println!("Database: {:?} ({})", app.store.backend(), app.config.database.database_name);
    println!("{:-<40}", "");
    for (table, count) in counts {
        println!("  {table:<20} {count:>10}");
    }
    Ok(())
}

/// Default backup file: `<location>/<database>_<timestamp>.db`.
#[must_use]
pub fn default_backup_path(location: &Path, database_name: &str) -> PathBuf {
    let stem = Path::new(database_name)
        .file_stem()
        .map_or_else(|| "degrow".to_string(), |s| s.to_string_lossy().into_owned());
    location.join(format!(
        "{stem}_{}.db",
        Utc::now().format("%Y%m%d_%H%M%S")
    ))
}

pub async fn cmd_db_backup(app: &App, actor: &Account, output: Option<PathBuf>) -> Result<()> {
    authorize(actor, Role::Admin)?;

    let target = output.unwrap_or_else(|| {
        default_backup_path(
            Path::new(&app.config.backup.location),
            &app.config.database.database_name,
        )
    });

    app.store.backup_to(&target).await?;
    println!("✓ Backup written to {}", target.display());
    Ok(())
}

/// Replaces the database contents with a backup. A SQLite database is backed
/// up first when `backup.backup_before_restore` is set.
pub async fn cmd_db_restore(app: &App, actor: &Account, input: &Path, yes: bool) -> Result<()> {
    authorize(actor, Role::Admin)?;

    if !input.is_file() {
        anyhow::bail!("Backup file not found: {}", input.display());
    }

    if !yes
        && !prompt::confirm(&format!(
            "Replace all data in {} with {}?",
            app.config.database.database_name,
            input.display()
        ))?
    {
        println!("Cancelled.");
        return Ok(());
    }

    if app.config.backup.backup_before_restore && app.store.backend() == DatabaseBackend::Sqlite {
        let safety = default_backup_path(
            Path::new(&app.config.backup.location),
            &app.config.database.database_name,
        );
        app.store.backup_to(&safety).await?;
        println!("✓ Current data saved to {}", safety.display());
    }

    let summary = app.store.restore_from(input).await?;

    println!("✓ Restored from {}", input.display());
    println!("{:-<40}", "");
    for (table, rows) in &summary.tables {
        println!("  {table:<20} {rows:>10}");
    }
    println!();
    println!("Sessions were restored from the backup; sign in again.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backup_path() {
        let path = default_backup_path(Path::new("./backups"), "data/degrow_workflow.db");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(path.starts_with("./backups"));
        assert!(name.starts_with("degrow_workflow_"));
        assert!(name.ends_with(".db"));
    }
}
