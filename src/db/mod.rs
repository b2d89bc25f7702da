use crate::config::{DatabaseBackend, DatabaseConfig};
use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseBackend as OrmBackend,
    DatabaseConnection, DatabaseTransaction, EntityTrait, IntoActiveModel, PaginatorTrait,
    Statement, TransactionTrait,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::entities::prelude::*;

pub mod migrator;
pub mod repositories;

pub use repositories::account::{AccountFilter, AccountRepository, FailedAttempt, NewAccount};
pub use repositories::audit::{AuditFilter, AuditRepository, NewAuditEntry};
pub use repositories::catalog::CatalogRepository;
pub use repositories::session::SessionRepository;
pub use repositories::workflow::{EntryFilter, WorkflowRepository};

const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";
const RESTORE_BATCH: usize = 200;

/// Rows copied per table by [`Store::restore_from`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RestoreSummary {
    pub tables: Vec<(&'static str, usize)>,
}

impl RestoreSummary {
    #[must_use]
    pub fn rows(&self, table: &str) -> Option<usize> {
        self.tables
            .iter()
            .find(|(name, _)| *name == table)
            .map(|(_, rows)| *rows)
    }
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    /// Opens the configured backend and applies pending migrations.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if config.backend == DatabaseBackend::Sqlite {
            let path = config.sqlite_path();
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let mut opt = ConnectOptions::new(config.url());
        opt.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt)
            .await
            .with_context(|| format!("Failed to connect to {:?} database", config.backend))?;

        migrator::Migrator::up(&conn, None)
            .await
            .context("Failed to apply database migrations")?;

        info!(
            backend = ?config.backend,
            "Database connected & migrations applied (pool: {}-{})",
            config.min_connections,
            config.max_connections
        );

        Ok(Self { conn })
    }

    /// Opens a SQLite file directly. Used by tests and tooling.
    pub async fn open_sqlite(path: &Path) -> Result<Self> {
        let config = DatabaseConfig {
            database_name: path.display().to_string(),
            ..DatabaseConfig::default()
        };
        Self::connect(&config).await
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn backend(&self) -> OrmBackend {
        self.conn.get_database_backend()
    }

    #[must_use]
    pub fn accounts(&self) -> AccountRepository {
        AccountRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn sessions(&self) -> SessionRepository {
        SessionRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn audit(&self) -> AuditRepository {
        AuditRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn workflow(&self) -> WorkflowRepository {
        WorkflowRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.conn.clone())
    }

    /// Row count per table, for the database overview.
    pub async fn table_counts(&self) -> Result<Vec<(&'static str, u64)>> {
        Ok(vec![
            ("accounts", Accounts::find().count(&self.conn).await?),
            ("sessions", Sessions::find().count(&self.conn).await?),
            ("audit_log", AuditLog::find().count(&self.conn).await?),
            ("milestones", Milestones::find().count(&self.conn).await?),
            ("subtasks", Subtasks::find().count(&self.conn).await?),
            (
                "workflow_entries",
                WorkflowEntries::find().count(&self.conn).await?,
            ),
            (
                "site_schedules",
                SiteSchedules::find().count(&self.conn).await?,
            ),
            (
                "password_history",
                PasswordHistory::find().count(&self.conn).await?,
            ),
        ])
    }

    /// Replaces every row of this database with the contents of a SQLite
    /// backup, in one transaction.
    ///
    /// The backup is copied to a scratch file and migrated there first, so
    /// backups taken before later schema changes still restore. The backup
    /// file itself is never written to.
    pub async fn restore_from(&self, backup: &Path) -> Result<RestoreSummary> {
        check_sqlite_file(backup).await?;

        let scratch = scratch_copy_path(backup);
        tokio::fs::copy(backup, &scratch)
            .await
            .with_context(|| format!("Failed to read backup {}", backup.display()))?;

        let result = self.restore_from_scratch(&scratch).await;

        if let Err(e) = tokio::fs::remove_file(&scratch).await {
            warn!(path = %scratch.display(), error = %e, "Failed to remove restore scratch file");
        }

        let summary = result?;
        info!(
            "Database restored from {} ({} tables)",
            backup.display(),
            summary.tables.len()
        );
        Ok(summary)
    }

    async fn restore_from_scratch(&self, scratch: &Path) -> Result<RestoreSummary> {
        let source = Self::open_sqlite(scratch)
            .await
            .context("Backup is not a readable degrow database")?
            .conn;

        let txn = self.conn.begin().await?;

        // Children first so foreign keys never dangle.
        PasswordHistory::delete_many().exec(&txn).await?;
        Sessions::delete_many().exec(&txn).await?;
        AuditLog::delete_many().exec(&txn).await?;
        WorkflowEntries::delete_many().exec(&txn).await?;
        SiteSchedules::delete_many().exec(&txn).await?;
        Subtasks::delete_many().exec(&txn).await?;
        Milestones::delete_many().exec(&txn).await?;
        Accounts::delete_many().exec(&txn).await?;

        let tables = vec![
            ("accounts", copy_rows::<Accounts>(&source, &txn).await?),
            ("milestones", copy_rows::<Milestones>(&source, &txn).await?),
            ("subtasks", copy_rows::<Subtasks>(&source, &txn).await?),
            ("sessions", copy_rows::<Sessions>(&source, &txn).await?),
            (
                "password_history",
                copy_rows::<PasswordHistory>(&source, &txn).await?,
            ),
            ("audit_log", copy_rows::<AuditLog>(&source, &txn).await?),
            (
                "workflow_entries",
                copy_rows::<WorkflowEntries>(&source, &txn).await?,
            ),
            (
                "site_schedules",
                copy_rows::<SiteSchedules>(&source, &txn).await?,
            ),
        ];

        txn.commit().await?;
        source.close().await?;

        Ok(RestoreSummary { tables })
    }

    /// Writes a consistent copy of an embedded database to `target`.
    ///
    /// Server backends are backed up with their own tooling, so this only
    /// supports SQLite.
    pub async fn backup_to(&self, target: &Path) -> Result<()> {
        let backend = self.backend();
        if backend != OrmBackend::Sqlite {
            anyhow::bail!("Online backup is only supported for SQLite databases");
        }

        if target.exists() {
            anyhow::bail!("Backup target already exists: {}", target.display());
        }

        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.conn
            .execute(Statement::from_sql_and_values(
                backend,
                "VACUUM INTO ?",
                [target.display().to_string().into()],
            ))
            .await
            .with_context(|| format!("Failed to back up database to {}", target.display()))?;

        info!("Database backed up to {}", target.display());
        Ok(())
    }
}

async fn check_sqlite_file(path: &Path) -> Result<()> {
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open backup {}", path.display()))?;

    let mut header = [0u8; 16];
    if file.read_exact(&mut header).await.is_err() || &header != SQLITE_HEADER {
        anyhow::bail!("{} is not a SQLite database", path.display());
    }
    Ok(())
}

fn scratch_copy_path(backup: &Path) -> PathBuf {
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    let stem = backup
        .file_stem()
        .map_or_else(|| "backup".into(), |s| s.to_string_lossy());
    std::env::temp_dir().join(format!(
        "degrow-restore-{stem}-{}-{stamp}.db",
        std::process::id()
    ))
}

/// Copies every row of `E` with its primary key intact.
async fn copy_rows<E>(source: &DatabaseConnection, target: &DatabaseTransaction) -> Result<usize>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
{
    let mut rows = E::find().all(source).await?.into_iter().peekable();
    let mut copied = 0;

    while rows.peek().is_some() {
        let batch: Vec<E::ActiveModel> = rows
            .by_ref()
            .take(RESTORE_BATCH)
            .map(|row| row.into_active_model().reset_all())
            .collect();
        copied += batch.len();
        E::insert_many(batch).exec_without_returning(target).await?;
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_copy_lives_in_temp_dir() {
        let path = scratch_copy_path(Path::new("backups/degrow_20250301.db"));
        assert!(path.starts_with(std::env::temp_dir()));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("degrow-restore-degrow_20250301-"));
        assert!(name.ends_with(".db"));
    }
}
