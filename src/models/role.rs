use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account role. Declaration order is rank order, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Guest,
    User,
    Supervisor,
    Manager,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Self; 6] = [
        Self::Guest,
        Self::User,
        Self::Supervisor,
        Self::Manager,
        Self::Admin,
        Self::SuperAdmin,
    ];

    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Guest => 1,
            Self::User => 2,
            Self::Supervisor => 3,
            Self::Manager => 4,
            Self::Admin => 5,
            Self::SuperAdmin => 6,
        }
    }

    /// Rank of a stored role string; unrecognised roles rank 0 and hold no permission.
    #[must_use]
    pub fn rank_of(role: &str) -> u8 {
        role.parse::<Self>().map_or(0, Self::rank)
    }

    #[must_use]
    pub const fn has_permission(self, required: Self) -> bool {
        self.rank() >= required.rank()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::User => "user",
            Self::Supervisor => "supervisor",
            Self::Manager => "manager",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "guest" => Ok(Self::Guest),
            "user" => Ok(Self::User),
            "supervisor" => Ok(Self::Supervisor),
            "manager" => Ok(Self::Manager),
            "admin" => Ok(Self::Admin),
            "super_admin" | "superadmin" => Ok(Self::SuperAdmin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranks_form_total_order() {
        for pair in Role::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn test_has_permission() {
        assert!(Role::Admin.has_permission(Role::Manager));
        assert!(Role::Manager.has_permission(Role::Manager));
        assert!(!Role::User.has_permission(Role::Manager));
        assert!(Role::SuperAdmin.has_permission(Role::Admin));
        assert!(!Role::Guest.has_permission(Role::User));
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!("Super-Admin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert_eq!("superadmin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert_eq!(" Manager ".parse::<Role>().unwrap(), Role::Manager);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_unknown_role_ranks_zero() {
        assert_eq!(Role::rank_of("operator"), 0);
        assert_eq!(Role::rank_of("admin"), 5);
    }

    #[test]
    fn test_display_round_trips() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }
}
