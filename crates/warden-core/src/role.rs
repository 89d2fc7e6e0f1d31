//! # Roles and Role Checks
//!
//! Authorization roles and the pure ANY/ALL policy evaluation used by the
//! access-control gate.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Authorization role codes.
///
/// Declaration order is the canonical ordering of a role set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RoleCode {
    SuperAdmin,
    Admin,
    Guest,
    User,
    UserVip,
    UserSvip,
}

impl RoleCode {
    /// Every role code, in canonical order.
    pub const ALL: [RoleCode; 6] = [
        Self::SuperAdmin,
        Self::Admin,
        Self::Guest,
        Self::User,
        Self::UserVip,
        Self::UserSvip,
    ];

    /// Return the string representation of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Guest => "guest",
            Self::User => "user",
            Self::UserVip => "user_vip",
            Self::UserSvip => "user_svip",
        }
    }
}

impl std::fmt::Display for RoleCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| format!("unknown role code: {s}"))
    }
}

/// A role as recorded by the persistent store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub code: RoleCode,
    pub enabled: bool,
}

/// How a set of required roles is matched against a principal's roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleCheckMode {
    /// At least one required role is held.
    Any,
    /// Every required role is held.
    All,
}

/// Evaluate a role requirement.
///
/// An empty `required` list always passes regardless of mode.
pub fn role_check(mode: RoleCheckMode, required: &[RoleCode], actual: &BTreeSet<RoleCode>) -> bool {
    if required.is_empty() {
        return true;
    }
    match mode {
        RoleCheckMode::Any => required.iter().any(|role| actual.contains(role)),
        RoleCheckMode::All => required.iter().all(|role| actual.contains(role)),
    }
}
