//! Login, lockout and session lifecycle against a real SQLite database.

mod common;

use chrono::{Duration, TimeZone, Utc};
use degrow::clock::{ManualClock, SharedClock};
use degrow::config::SecurityConfig;
use degrow::db::{AuditFilter, Store};
use degrow::models::{Account, Role};
use degrow::services::password;
use degrow::services::{
    AccountService, AuthError, AuthService, CreateAccountRequest, SeaOrmAccountService,
    SeaOrmAuthService,
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

fn test_security() -> SecurityConfig {
    SecurityConfig {
        pbkdf2_iterations: 1_000,
        ..SecurityConfig::default()
    }
}

async fn setup_with(security: SecurityConfig) -> TestContext {
    let db = TempDatabase::new("auth");
    let store = Store::open_sqlite(db.path())
        .await
        .expect("failed to open test database");

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

async fn setup() -> TestContext {
    setup_with(test_security()).await
}

async fn create_account(ctx: &TestContext, username: &str, password: &str) -> Account {
    ctx.accounts
        .create_account(
            CreateAccountRequest {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password: password.to_string(),
                role: Role::User,
                must_change_password: false,
            },
            None,
        )
        .await
        .expect("failed to create account")
}

async fn failed_attempts(ctx: &TestContext, id: i32) -> i32 {
    ctx.store
        .accounts()
        .get_by_id(id)
        .await
        .unwrap()
        .unwrap()
        .failed_login_attempts
}

#[tokio::test]
async fn test_correct_password_always_succeeds_and_resets_counter() {
    let ctx = setup().await;
    let alice = create_account(&ctx, "alice", "Secret123!").await;

    let err = ctx.auth.authenticate("alice", "wrong", None).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert_eq!(failed_attempts(&ctx, alice.id).await, 1);

    for _ in 0..3 {
        let authenticated = ctx.auth.authenticate("alice", "Secret123!", None).await.unwrap();
        assert_eq!(authenticated.account.id, alice.id);
        assert_eq!(authenticated.account.failed_login_attempts, 0);
        assert!(authenticated.account.last_login_at.is_some());
    }
}

#[tokio::test]
async fn test_login_by_email() {
    let ctx = setup().await;
    create_account(&ctx, "alice", "Secret123!").await;

    let authenticated = ctx
        .auth
        .authenticate("alice@example.com", "Secret123!", Some("10.0.0.5"))
        .await
        .unwrap();
    assert_eq!(authenticated.account.username, "alice");
    assert_eq!(authenticated.session.client_address.as_deref(), Some("10.0.0.5"));
}

#[tokio::test]
async fn test_unknown_account_is_rejected() {
    let ctx = setup().await;

    let err = ctx.auth.authenticate("nobody", "Secret123!", None).await.unwrap_err();
    assert!(matches!(err, AuthError::AccountNotFound));
}

#[tokio::test]
async fn test_lockout_after_four_failures_until_window_elapses() {
    let ctx = setup().await;
    let alice = create_account(&ctx, "alice", "Secret123!").await;

    for _ in 0..4 {
        let err = ctx.auth.authenticate("alice", "wrong", None).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    // The correct password does not help while the lock holds.
    let err = ctx.auth.authenticate("alice", "Secret123!", None).await.unwrap_err();
    assert!(matches!(err, AuthError::AccountLocked { .. }));
    assert_eq!(failed_attempts(&ctx, alice.id).await, 4);

    ctx.clock.advance(Duration::minutes(14));
    let err = ctx.auth.authenticate("alice", "Secret123!", None).await.unwrap_err();
    assert!(matches!(err, AuthError::AccountLocked { .. }));

    ctx.clock.advance(Duration::minutes(2));
    let authenticated = ctx.auth.authenticate("alice", "Secret123!", None).await.unwrap();
    assert_eq!(authenticated.account.failed_login_attempts, 0);
    assert!(authenticated.account.locked_until.is_none());
}

#[tokio::test]
async fn test_expired_lock_resets_the_counter_before_a_failure() {
    let ctx = setup().await;
    let alice = create_account(&ctx, "alice", "Secret123!").await;

    for _ in 0..4 {
        assert!(matches!(
            ctx.auth.authenticate("alice", "wrong", None).await,
            Err(AuthError::InvalidCredentials)
        ));
    }
    ctx.clock.advance(Duration::minutes(16));

    let err = ctx.auth.authenticate("alice", "wrong", None).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert_eq!(failed_attempts(&ctx, alice.id).await, 1);
}

#[tokio::test]
async fn test_inactive_account_cannot_login() {
    let ctx = setup().await;
    let admin = create_account(&ctx, "admin1", "Secret123!").await;
    let alice = create_account(&ctx, "alice", "Secret123!").await;

    ctx.accounts.set_active(alice.id, false, admin.id).await.unwrap();

    let err = ctx.auth.authenticate("alice", "Secret123!", None).await.unwrap_err();
    assert!(matches!(err, AuthError::AccountInactive));
}

#[tokio::test]
async fn test_new_session_ends_previous_sessions_of_same_account_only() {
    let ctx = setup().await;
    let alice = create_account(&ctx, "alice", "Secret123!").await;
    create_account(&ctx, "bob", "Secret123!").await;

    let first = ctx.auth.authenticate("alice", "Secret123!", None).await.unwrap();
    let bob = ctx.auth.authenticate("bob", "Secret123!", None).await.unwrap();
    ctx.clock.advance(Duration::minutes(1));
    let second = ctx.auth.authenticate("alice", "Secret123!", None).await.unwrap();

    assert_ne!(first.session.token, second.session.token);

    let sessions = ctx.store.sessions();
    let old = sessions.get_by_token(&first.session.token).await.unwrap().unwrap();
    assert!(!old.is_active);
    assert!(old.ended_at.is_some());

    let current = sessions.get_by_token(&second.session.token).await.unwrap().unwrap();
    assert!(current.is_active);

    let other = sessions.get_by_token(&bob.session.token).await.unwrap().unwrap();
    assert!(other.is_active);

    assert_eq!(sessions.list_for_account(alice.id).await.unwrap().len(), 2);
    assert!(matches!(
        ctx.auth.validate_session(&first.session.token).await,
        Err(AuthError::SessionInvalid)
    ));
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let ctx = setup().await;
    let alice = create_account(&ctx, "alice", "Secret123!").await;
    let session = ctx.auth.authenticate("alice", "Secret123!", None).await.unwrap();

    assert!(ctx.auth.logout(&session.session.token).await.unwrap());
    assert!(!ctx.auth.logout(&session.session.token).await.unwrap());
    assert!(!ctx.auth.logout("no-such-token").await.unwrap());

    let logouts = ctx
        .store
        .audit()
        .list(&AuditFilter {
            account_id: Some(alice.id),
            action: Some("logout".to_string()),
            ..AuditFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(logouts.len(), 1);
    assert_eq!(logouts[0].session_token.as_deref(), Some(session.session.token.as_str()));
}

#[tokio::test]
async fn test_failed_attempts_then_success_scenario() {
    let ctx = setup().await;
    let alice = create_account(&ctx, "alice", "Secret123!").await;

    for _ in 0..3 {
        assert!(matches!(
            ctx.auth.authenticate("alice", "Wrong123!", None).await,
            Err(AuthError::InvalidCredentials)
        ));
    }
    assert_eq!(failed_attempts(&ctx, alice.id).await, 3);

    let authenticated = ctx.auth.authenticate("alice", "Secret123!", None).await.unwrap();
    assert_eq!(authenticated.account.failed_login_attempts, 0);

    let sessions = ctx.store.sessions().list_for_account(alice.id).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].is_active);

    let audit = ctx.store.audit();
    let logins = audit
        .list(&AuditFilter {
            account_id: Some(alice.id),
            action: Some("login".to_string()),
            ..AuditFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(logins.len(), 1);

    let failures = audit
        .list(&AuditFilter {
            account_id: Some(alice.id),
            action: Some("login_failed".to_string()),
            ..AuditFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(failures.len(), 3);
}

#[tokio::test]
async fn test_validate_session_returns_account() {
    let ctx = setup().await;
    let alice = create_account(&ctx, "alice", "Secret123!").await;
    let session = ctx.auth.authenticate("alice", "Secret123!", None).await.unwrap();

    ctx.clock.advance(Duration::minutes(5));
    let account = ctx.auth.validate_session(&session.session.token).await.unwrap();
    assert_eq!(account.id, alice.id);

    let stored = ctx
        .store
        .sessions()
        .get_by_token(&session.session.token)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.last_activity_at > session.session.login_at);

    assert!(matches!(
        ctx.auth.validate_session("missing").await,
        Err(AuthError::SessionInvalid)
    ));
}

#[tokio::test]
async fn test_change_password() {
    let ctx = setup().await;
    let alice = create_account(&ctx, "alice", "Secret123!").await;

    let err = ctx
        .auth
        .change_password(alice.id, "Wrong123!", "Another456?")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));

    let err = ctx
        .auth
        .change_password(alice.id, "Secret123!", "Secret123!")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));

    let err = ctx
        .auth
        .change_password(alice.id, "Secret123!", "short")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));

    ctx.auth
        .change_password(alice.id, "Secret123!", "Another456?")
        .await
        .unwrap();

    assert!(ctx.auth.authenticate("alice", "Secret123!", None).await.is_err());
    let authenticated = ctx.auth.authenticate("alice", "Another456?", None).await.unwrap();
    assert!(!authenticated.account.must_change_password);
    assert!(authenticated.account.password_changed_at.is_some());
}

#[tokio::test]
async fn test_weaker_hash_is_upgraded_on_login() {
    let ctx = setup().await;
    let alice = create_account(&ctx, "alice", "Secret123!").await;

    let stronger = SecurityConfig {
        pbkdf2_iterations: 2_000,
        ..SecurityConfig::default()
    };
    let shared: SharedClock = Arc::new(ctx.clock.clone());
    let auth = SeaOrmAuthService::with_clock(ctx.store.clone(), stronger, shared);

    auth.authenticate("alice", "Secret123!", None).await.unwrap();

    let stored = ctx.store.accounts().get_by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(password::iterations_of(&stored.password_hash), Some(2_000));
    assert!(auth.authenticate("alice", "Secret123!", None).await.is_ok());
}
