use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Lowest PBKDF2 iteration count accepted from a config file.
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// One year.
pub const MAX_LOCKOUT_MINUTES: i64 = 525_600;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,

    pub backup: BackupConfig,

    pub logging: LoggingConfig,

    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Mysql,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    #[serde(rename = "type")]
    pub backend: DatabaseBackend,

    pub host: String,

    pub port: u16,

    pub username: String,

    pub password: String,

    /// Schema name for MySQL, file path for SQLite (".db" is appended when missing).
    pub database_name: String,

    pub charset: String,

    /// Kept for compatibility with existing config files. Every statement
    /// outside an explicit transaction is committed on its own.
    pub autocommit: bool,

    pub max_connections: u32,

    pub min_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Sqlite,
            host: "localhost".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: String::new(),
            database_name: "degrow_workflow".to_string(),
            charset: "utf8mb4".to_string(),
            autocommit: true,
            max_connections: 5,
            min_connections: 1,
        }
    }
}

impl DatabaseConfig {
    /// File path of the embedded database.
    #[must_use]
    pub fn sqlite_path(&self) -> PathBuf {
        let name = &self.database_name;
        if Path::new(name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("db"))
        {
            PathBuf::from(name)
        } else {
            PathBuf::from(format!("{name}.db"))
        }
    }

    /// Connection URL for the configured backend.
    #[must_use]
    pub fn url(&self) -> String {
        match self.backend {
            DatabaseBackend::Sqlite => {
                format!("sqlite://{}?mode=rwc", self.sqlite_path().display())
            }
            DatabaseBackend::Mysql => {
                let credentials = if self.password.is_empty() {
                    urlencoding::encode(&self.username).into_owned()
                } else {
                    format!(
                        "{}:{}",
                        urlencoding::encode(&self.username),
                        urlencoding::encode(&self.password)
                    )
                };
                format!(
                    "mysql://{credentials}@{}:{}/{}?charset={}",
                    self.host, self.port, self.database_name, self.charset
                )
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Directory for `degrow db backup` when no output file is given.
    pub location: String,

    /// Copy the live SQLite database to `location` before a restore replaces it.
    pub backup_before_restore: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            location: "./backups".to_string(),
            backup_before_restore: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, `RUST_LOG` takes precedence.
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// PBKDF2-HMAC-SHA256 iteration count for new hashes.
    pub pbkdf2_iterations: u32,

    /// Re-hash on login when the stored hash uses fewer iterations.
    pub upgrade_password_hashes: bool,

    /// Consecutive failures that trigger a lockout.
    pub max_failed_attempts: u32,

    pub lockout_minutes: i64,

    /// Number of previous passwords that may not be reused. 0 disables the check.
    pub password_history_size: u32,

    pub password_policy: PasswordPolicy,

    pub bootstrap_admin: BootstrapAdminConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: 200_000,
            upgrade_password_hashes: true,
            max_failed_attempts: 4,
            lockout_minutes: 15,
            password_history_size: 5,
            password_policy: PasswordPolicy::default(),
            bootstrap_admin: BootstrapAdminConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
        }
    }
}

/// Account created when the database holds no accounts at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapAdminConfig {
    pub enabled: bool,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Default for BootstrapAdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            username: "admin".to_string(),
            email: "admin@workflow.local".to_string(),
            password: "ChangeMe123!".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            backup: BackupConfig::default(),
            logging: LoggingConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl Config {
    /// Loads the first config file found in the search paths, or defaults.
    pub fn load() -> Result<Self> {
        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Parses JSON, or TOML when the file ends in `.toml`.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_toml(path) {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        };

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = if is_toml(path) {
            toml::to_string_pretty(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("config.json"),
            PathBuf::from("config.toml"),
        ];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("degrow").join("config.json"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".degrow").join("config.json"));
        }

        paths
    }

    #[must_use]
    pub fn default_config_path() -> PathBuf {
        PathBuf::from("config.json")
    }

    /// Writes a default config file unless one already exists at `path`.
    pub fn create_default_if_missing(path: &Path) -> Result<bool> {
        if path.exists() {
            Ok(false)
        } else {
            Self::default().save_to_path(path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let db = &self.database;

        if db.database_name.trim().is_empty() {
            anyhow::bail!("database.database_name cannot be empty");
        }

        if db.backend == DatabaseBackend::Mysql {
            if db.host.trim().is_empty() {
                anyhow::bail!("database.host cannot be empty for MySQL");
            }
            if db.port == 0 {
                anyhow::bail!("database.port must be > 0 for MySQL");
            }
        }

        if db.max_connections == 0 || db.min_connections > db.max_connections {
            anyhow::bail!(
                "database connection pool bounds are invalid ({}-{})",
                db.min_connections,
                db.max_connections
            );
        }

        if !db.autocommit {
            warn!("database.autocommit=false has no effect; statements commit individually");
        }

        let security = &self.security;

        if security.pbkdf2_iterations < MIN_PBKDF2_ITERATIONS {
            anyhow::bail!(
                "security.pbkdf2_iterations must be at least {MIN_PBKDF2_ITERATIONS}"
            );
        }

        if security.max_failed_attempts == 0 {
            anyhow::bail!("security.max_failed_attempts must be > 0");
        }

        if security.lockout_minutes <= 0 || security.lockout_minutes > MAX_LOCKOUT_MINUTES {
            anyhow::bail!("security.lockout_minutes must be between 1 and {MAX_LOCKOUT_MINUTES}");
        }

        if security.password_policy.min_length < 4 {
            anyhow::bail!("security.password_policy.min_length must be at least 4");
        }

        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}
