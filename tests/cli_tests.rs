//! Signed-in command dispatch against a real SQLite database.

mod common;

use degrow::Config;
use degrow::cli::commands::dispatch;
use degrow::cli::{App, Commands, DbCommands};
use degrow::services::AuthService;

use common::TempDatabase;

fn config_for(db: &TempDatabase) -> Config {
    let mut config = Config::default();
    config.database.database_name = db.path().display().to_string();
    config.security.pbkdf2_iterations = 1_000;
    config
}

#[tokio::test]
async fn test_bootstrap_admin_must_change_password_before_other_commands() {
    let db = TempDatabase::new("cli");
    let app = App::open(&config_for(&db)).await.unwrap();

    let session = app
        .auth
        .authenticate("admin", "ChangeMe123!", Some("cli"))
        .await
        .unwrap();
    assert!(session.account.must_change_password);

    let err = dispatch(
        &app,
        &session.account,
        Commands::Db {
            command: DbCommands::Stats,
        },
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Password change required"));

    assert!(
        dispatch(&app, &session.account, Commands::Report { json: true })
            .await
            .is_err()
    );

    app.auth
        .change_password(session.account.id, "ChangeMe123!", "Fresh456?")
        .await
        .unwrap();

    let account = app.auth.validate_session(&session.session.token).await.unwrap();
    assert!(!account.must_change_password);

    dispatch(
        &app,
        &account,
        Commands::Db {
            command: DbCommands::Stats,
        },
    )
    .await
    .unwrap();
    dispatch(&app, &account, Commands::Report { json: true })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_bootstrap_admin_is_created_once() {
    let db = TempDatabase::new("cli");
    let config = config_for(&db);

    let first = App::open(&config).await.unwrap();
    assert_eq!(first.store.accounts().count().await.unwrap(), 1);
    drop(first);

    let second = App::open(&config).await.unwrap();
    assert_eq!(second.store.accounts().count().await.unwrap(), 1);
}
