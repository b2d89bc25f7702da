//! Suspensions and password history against a real SQLite database.

mod common;

use chrono::{Duration, TimeZone, Utc};
use degrow::clock::{Clock, ManualClock, SharedClock};
use degrow::config::SecurityConfig;
use degrow::db::{AuditFilter, Store};
use degrow::models::{Account, Role};
use degrow::services::{
    AccountError, AccountService, AuthError, AuthService, CreateAccountRequest,
    SeaOrmAccountService, SeaOrmAuthService,
};
use std::sync::Arc;

use common::TempDatabase;

struct TestContext {
    store: Store,
    clock: ManualClock,
    auth: SeaOrmAuthService,
    accounts: SeaOrmAccountService,
    _db: TempDatabase,
}

async fn setup() -> TestContext {
    let db = TempDatabase::new("security");
    let store = Store::open_sqlite(db.path())
        .await
        .expect("failed to open test database");

    let security = SecurityConfig {
        pbkdf2_iterations: 1_000,
        password_history_size: 3,
        ..SecurityConfig::default()
    };
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap());
    let shared: SharedClock = Arc::new(clock.clone());

    TestContext {
        auth: SeaOrmAuthService::with_clock(store.clone(), security.clone(), shared.clone()),
        accounts: SeaOrmAccountService::with_clock(store.clone(), security, shared),
        store,
        clock,
        _db: db,
    }
}

async fn create(ctx: &TestContext, username: &str, role: Role) -> Account {
    ctx.accounts
        .create_account(
            CreateAccountRequest {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password: "Secret123!".to_string(),
                role,
                must_change_password: false,
            },
            None,
        )
        .await
        .expect("failed to create account")
}

#[tokio::test]
async fn test_suspension_blocks_login_until_it_ends() {
    let ctx = setup().await;
    let admin = create(&ctx, "admin", Role::Admin).await;
    let bob = create(&ctx, "bob", Role::User).await;

    let session = ctx.auth.authenticate("bob", "Secret123!", None).await.unwrap();

    let until = ctx.clock.now() + Duration::days(2);
    let suspended = ctx
        .accounts
        .suspend(bob.id, "  Pending audit ", Some(until), admin.id)
        .await
        .unwrap();
    assert_eq!(suspended.suspension_reason.as_deref(), Some("Pending audit"));
    assert_eq!(suspended.suspended_until, Some(until));
    assert!(suspended.is_suspended(ctx.clock.now()));

    // Existing sessions end with the suspension.
    assert!(matches!(
        ctx.auth.validate_session(&session.session.token).await,
        Err(AuthError::SessionInvalid)
    ));

    match ctx.auth.authenticate("bob", "Secret123!", None).await {
        Err(AuthError::AccountSuspended { reason, until: end }) => {
            assert_eq!(reason, "Pending audit");
            assert_eq!(end, Some(until));
        }
        other => panic!("expected a suspension, got {other:?}"),
    }

    let stats = ctx.accounts.statistics().await.unwrap();
    assert_eq!(stats.suspended, 1);

    ctx.clock.advance(Duration::days(2));
    let authenticated = ctx.auth.authenticate("bob", "Secret123!", None).await.unwrap();
    assert!(authenticated.account.suspended_at.is_none());
    assert!(authenticated.account.suspension_reason.is_none());

    let stats = ctx.accounts.statistics().await.unwrap();
    assert_eq!(stats.suspended, 0);
}

#[tokio::test]
async fn test_open_ended_suspension_is_lifted_by_an_administrator() {
    let ctx = setup().await;
    let admin = create(&ctx, "admin", Role::Admin).await;
    let bob = create(&ctx, "bob", Role::User).await;

    ctx.accounts
        .suspend(bob.id, "Left the project", None, admin.id)
        .await
        .unwrap();

    ctx.clock.advance(Duration::days(365));
    assert!(matches!(
        ctx.auth.authenticate("bob", "Secret123!", None).await,
        Err(AuthError::AccountSuspended { until: None, .. })
    ));

    let lifted = ctx.accounts.lift_suspension(bob.id, admin.id).await.unwrap();
    assert!(!lifted.is_suspended(ctx.clock.now()));
    ctx.auth.authenticate("bob", "Secret123!", None).await.unwrap();

    let err = ctx
        .accounts
        .lift_suspension(bob.id, admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Validation(_)));

    let actions: Vec<String> = ctx
        .store
        .audit()
        .list(&AuditFilter {
            account_id: Some(admin.id),
            ..AuditFilter::default()
        })
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.action)
        .collect();
    assert!(actions.contains(&"account_suspended".to_string()));
    assert!(actions.contains(&"account_unsuspended".to_string()));
}

#[tokio::test]
async fn test_suspension_guards() {
    let ctx = setup().await;
    let admin = create(&ctx, "admin", Role::Admin).await;
    let bob = create(&ctx, "bob", Role::User).await;

    let err = ctx
        .accounts
        .suspend(admin.id, "Holiday", None, admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Forbidden(_)));

    let err = ctx
        .accounts
        .suspend(bob.id, "   ", None, admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Validation(_)));

    let past = ctx.clock.now() - Duration::hours(1);
    let err = ctx
        .accounts
        .suspend(bob.id, "Holiday", Some(past), admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Validation(_)));

    let stored = ctx.store.accounts().get_by_id(bob.id).await.unwrap().unwrap();
    assert!(stored.suspended_at.is_none());
}

#[tokio::test]
async fn test_change_password_refuses_recent_passwords() {
    let ctx = setup().await;
    let alice = create(&ctx, "alice", Role::User).await;

    ctx.auth
        .change_password(alice.id, "Secret123!", "Second456?")
        .await
        .unwrap();

    let err = ctx
        .auth
        .change_password(alice.id, "Second456?", "Secret123!")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));

    ctx.auth
        .change_password(alice.id, "Second456?", "Third789#")
        .await
        .unwrap();
    ctx.auth
        .change_password(alice.id, "Third789#", "Fourth012$")
        .await
        .unwrap();

    // Secret123! has dropped out of the last three passwords.
    ctx.auth
        .change_password(alice.id, "Fourth012$", "Secret123!")
        .await
        .unwrap();
    ctx.auth.authenticate("alice", "Secret123!", None).await.unwrap();

    let history = ctx
        .store
        .accounts()
        .recent_password_hashes(alice.id, 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 5);
}

#[tokio::test]
async fn test_reset_password_refuses_recent_passwords() {
    let ctx = setup().await;
    let admin = create(&ctx, "admin", Role::Admin).await;
    let bob = create(&ctx, "bob", Role::User).await;

    let err = ctx
        .accounts
        .reset_password(bob.id, "Secret123!", admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Validation(_)));

    ctx.accounts
        .reset_password(bob.id, "Fresh456?", admin.id)
        .await
        .unwrap();
    let authenticated = ctx.auth.authenticate("bob", "Fresh456?", None).await.unwrap();
    assert!(authenticated.account.must_change_password);
}
