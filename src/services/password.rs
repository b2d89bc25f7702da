//! PBKDF2-HMAC-SHA256 hashing and the password policy.
//!
//! Hashes are stored as PHC strings, so the salt and the iteration count
//! travel with the hash and older hashes keep verifying after the
//! configured iteration count is raised.

use anyhow::{Context, Result};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Algorithm, Params, Pbkdf2};
use rand::Rng;
use tokio::task;

use crate::config::PasswordPolicy;
use crate::db::Store;

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

pub fn hash_password_blocking(password: &str, iterations: u32) -> Result<String> {
    let salt_bytes = rand::rng().random::<[u8; SALT_LEN]>();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| anyhow::anyhow!("Failed to encode salt: {e}"))?;

    let params = Params {
        rounds: iterations,
        output_length: HASH_LEN,
    };

    let hash = Pbkdf2
        .hash_password_customized(
            password.as_bytes(),
            Some(Algorithm::Pbkdf2Sha256.ident()),
            None,
            params,
            &salt,
        )
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Checks `password` against a stored PHC string. A malformed hash is an
/// error rather than a mismatch.
pub fn verify_password_blocking(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

    Ok(Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok())
}

/// Iteration count recorded in a stored hash, if it has one.
#[must_use]
pub fn iterations_of(stored: &str) -> Option<u32> {
    PasswordHash::new(stored)
        .ok()
        .and_then(|parsed| parsed.params.get_decimal("i"))
}

/// Hashes on the blocking pool; PBKDF2 at production iteration counts
/// takes long enough to stall the runtime.
pub async fn hash_password(password: &str, iterations: u32) -> Result<String> {
    let password = password.to_string();
    task::spawn_blocking(move || hash_password_blocking(&password, iterations))
        .await
        .context("Password hashing task panicked")?
}

pub async fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let password = password.to_string();
    let stored = stored.to_string();
    task::spawn_blocking(move || verify_password_blocking(&password, &stored))
        .await
        .context("Password verification task panicked")?
}

/// True when `password` produced any of `hashes`. Malformed entries never match.
pub async fn matches_any(password: &str, hashes: Vec<String>) -> Result<bool> {
    let password = password.to_string();
    task::spawn_blocking(move || {
        hashes
            .iter()
            .any(|stored| verify_password_blocking(&password, stored).unwrap_or(false))
    })
    .await
    .context("Password history check panicked")
}

/// Whether `password` is among the last `history_size` passwords of the account.
pub async fn reused_recently(
    store: &Store,
    account_id: i32,
    password: &str,
    history_size: u32,
) -> Result<bool> {
    if history_size == 0 {
        return Ok(false);
    }

    let recent = store
        .accounts()
        .recent_password_hashes(account_id, u64::from(history_size))
        .await?;
    matches_any(password, recent).await
}

/// Lists every rule of `policy` that `password` breaks. Empty means acceptable.
#[must_use]
pub fn policy_violations(password: &str, policy: &PasswordPolicy) -> Vec<String> {
    let mut problems = Vec::new();

    if password.chars().count() < policy.min_length {
        problems.push(format!(
            "must be at least {} characters long",
            policy.min_length
        ));
    }
    if policy.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
        problems.push("must contain an uppercase letter".to_string());
    }
    if policy.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
        problems.push("must contain a lowercase letter".to_string());
    }
    if policy.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("must contain a digit".to_string());
    }
    if policy.require_special && !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        problems.push(format!(
            "must contain one of the special characters {SPECIAL_CHARACTERS}"
        ));
    }

    problems
}

/// Policy check rendered as a single message, for service validation errors.
pub fn check_policy(password: &str, policy: &PasswordPolicy) -> Result<(), String> {
    let problems = policy_violations(password, policy);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(format!("Password {}", problems.join(", ")))
    }
}
