pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod entities;
pub mod models;
pub mod schedule;
pub mod services;

use clap::{CommandFactory, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{App, Cli, Commands};
pub use config::Config;
use config::LogFormat;

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Init { force }) = &cli.command {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(Config::default_config_path);
        init_tracing(&Config::default());
        return cli::commands::cmd_init(&path, *force).await;
    }

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    init_tracing(&config);
    config.validate()?;

    let console = cli.console || matches!(cli.command, Some(Commands::Console));
    if !console && cli.command.is_none() {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    }

    let app = App::open(&config).await?;
    info!(backend = ?app.store.backend(), "Database ready");

    if console {
        return cli::console::run(&app).await;
    }

    let Some(command) = cli.command else {
        return Ok(());
    };

    let session = app.login(cli.user.as_deref()).await?;
    let result = cli::commands::dispatch(&app, &session.account, command).await;
    app.logout(&session.session.token).await;
    result
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format {
        LogFormat::Json => registry.with(fmt_layer.json()).init(),
        LogFormat::Text => registry.with(fmt_layer).init(),
    }
}
