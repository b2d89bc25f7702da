//! Init command handler

use anyhow::Result;
use std::path::Path;

use crate::cli::App;
use crate::config::{Config, DatabaseBackend};

pub async fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if force && path.exists() {
        Config::default().save_to_path(path)?;
        println!("✓ Overwrote {} with defaults", path.display());
    } else if Config::create_default_if_missing(path)? {
        println!("✓ Created config file {}", path.display());
    } else {
        println!("Config file {} already exists, keeping it", path.display());
    }

    let config = Config::load_from_path(path)?;
    config.validate()?;

    let app = App::open(&config).await?;
    let milestones = app.store.catalog().list_milestones().await?;

    match config.database.backend {
        DatabaseBackend::Sqlite => println!(
            "✓ Database ready at {}",
            config.database.sqlite_path().display()
        ),
        DatabaseBackend::Mysql => println!(
            "✓ Database ready: {}@{}:{}/{}",
            config.database.username,
            config.database.host,
            config.database.port,
            config.database.database_name
        ),
    }
    println!("  {} milestones in the catalog", milestones.len());
    println!();
    println!("Next steps:");
    println!("  degrow --user {} passwd", config.security.bootstrap_admin.username);
    println!("  degrow --console");

    Ok(())
}
