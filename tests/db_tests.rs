//! Backup and restore of a SQLite database.

mod common;

use chrono::{TimeZone, Utc};
use degrow::clock::{ManualClock, SharedClock};
use degrow::config::SecurityConfig;
use degrow::db::{EntryFilter, Store};
use degrow::models::{Role, WorkflowStatus};
use degrow::services::{
    AccountService, AuthService, CreateAccountRequest, NewWorkflowEntry, SeaOrmAccountService,
    SeaOrmAuthService, SeaOrmWorkflowService, WorkflowService,
};
use std::sync::Arc;

use common::TempDatabase;

struct TestContext {
    store: Store,
    auth: SeaOrmAuthService,
    accounts: SeaOrmAccountService,
    workflow: SeaOrmWorkflowService,
    _db: TempDatabase,
}

async fn setup() -> TestContext {
    let db = TempDatabase::new("db");
    let store = Store::open_sqlite(db.path())
        .await
        .expect("failed to open test database");

    let security = SecurityConfig {
        pbkdf2_iterations: 1_000,
        ..SecurityConfig::default()
    };
    let clock: SharedClock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap(),
    ));

    TestContext {
        auth: SeaOrmAuthService::with_clock(store.clone(), security.clone(), clock.clone()),
        accounts: SeaOrmAccountService::with_clock(store.clone(), security, clock.clone()),
        workflow: SeaOrmWorkflowService::with_clock(store.clone(), clock),
        store,
        _db: db,
    }
}

fn entry(site: &str, status: WorkflowStatus) -> NewWorkflowEntry {
    NewWorkflowEntry {
        site_code: site.to_string(),
        state: "TX".to_string(),
        milestone: "Restrict CM".to_string(),
        status: Some(status),
        ..NewWorkflowEntry::default()
    }
}

fn request(username: &str) -> CreateAccountRequest {
    CreateAccountRequest {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password: "Secret123!".to_string(),
        role: Role::User,
        must_change_password: false,
    }
}

#[tokio::test]
async fn test_restore_brings_back_backed_up_rows() {
    let ctx = setup().await;
    let mut admin_request = request("admin");
    admin_request.role = Role::Admin;
    let admin = ctx.accounts.create_account(admin_request, None).await.unwrap();
    let alice = ctx.accounts.create_account(request("alice"), None).await.unwrap();
    ctx.workflow
        .record_entry(entry("SITE1", WorkflowStatus::Done), Some(alice.id))
        .await
        .unwrap();

    let backup = TempDatabase::new("db-backup");
    ctx.store.backup_to(backup.path()).await.unwrap();

    // Changes made after the backup are discarded by the restore.
    ctx.accounts.create_account(request("bob"), None).await.unwrap();
    ctx.workflow
        .record_entry(entry("SITE2", WorkflowStatus::Blocked), None)
        .await
        .unwrap();
    ctx.accounts.delete_account(alice.id, admin.id).await.unwrap();

    let summary = ctx.store.restore_from(backup.path()).await.unwrap();
    assert_eq!(summary.rows("accounts"), Some(2));
    assert_eq!(summary.rows("workflow_entries"), Some(1));
    assert_eq!(summary.rows("password_history"), Some(2));

    let restored = ctx.store.accounts().get_by_username("alice").await.unwrap().unwrap();
    assert_eq!(restored.id, alice.id);
    assert!(ctx.store.accounts().get_by_username("bob").await.unwrap().is_none());
    ctx.auth.authenticate("alice", "Secret123!", None).await.unwrap();

    let entries = ctx.workflow.list_entries(&EntryFilter::default()).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].site_code, "SITE1");
    assert_eq!(entries[0].recorded_by, Some(alice.id));

    // New rows continue after the restored ids.
    let bob = ctx.accounts.create_account(request("bob"), None).await.unwrap();
    assert!(bob.id > alice.id);

    let backup_store = Store::open_sqlite(backup.path()).await.unwrap();
    let counts = backup_store.table_counts().await.unwrap();
    assert!(counts.contains(&("accounts", 2)));
}

#[tokio::test]
async fn test_restore_rejects_files_that_are_not_sqlite() {
    let ctx = setup().await;
    ctx.accounts.create_account(request("alice"), None).await.unwrap();

    let bogus = TempDatabase::new("db-bogus");
    std::fs::write(bogus.path(), "site_code,status\nSITE1,Done\n").unwrap();

    let err = ctx.store.restore_from(bogus.path()).await.unwrap_err();
    assert!(err.to_string().contains("not a SQLite database"));

    let missing = TempDatabase::new("db-missing");
    assert!(ctx.store.restore_from(missing.path()).await.is_err());

    assert_eq!(ctx.store.accounts().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_backup_refuses_to_overwrite() {
    let ctx = setup().await;

    let backup = TempDatabase::new("db-backup");
    ctx.store.backup_to(backup.path()).await.unwrap();
    assert!(ctx.store.backup_to(backup.path()).await.is_err());
}
