use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entities::accounts;
use crate::models::Role;

/// Canonical form of a username or email: trimmed and lowercased.
///
/// Applied on every write and lookup so uniqueness does not depend on the
/// collation of the backend.
#[must_use]
pub fn normalize_identifier(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Account as seen outside the database layer. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub must_change_password: bool,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub suspended_at: Option<DateTime<Utc>>,
    pub suspended_until: Option<DateTime<Utc>>,
    pub suspension_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Parsed role; `None` for a stored role this build does not know.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.role.parse().ok()
    }

    #[must_use]
    pub fn has_permission(&self, required: Role) -> bool {
        Role::rank_of(&self.role) >= required.rank()
    }

    #[must_use]
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// A suspension without an end date lasts until it is lifted.
    #[must_use]
    pub fn is_suspended(&self, now: DateTime<Utc>) -> bool {
        self.suspended_at.is_some() && self.suspended_until.is_none_or(|until| until > now)
    }
}

impl From<accounts::Model> for Account {
    fn from(model: accounts::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            role: model.role,
            is_active: model.is_active,
            must_change_password: model.must_change_password,
            failed_login_attempts: model.failed_login_attempts,
            locked_until: model.locked_until,
            last_login_at: model.last_login_at,
            password_changed_at: model.password_changed_at,
            suspended_at: model.suspended_at,
            suspended_until: model.suspended_until,
            suspension_reason: model.suspension_reason,
            created_at: model.created_at,
        }
    }
}
