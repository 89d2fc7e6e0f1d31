//! # Principal Identity
//!
//! Newtypes for the identifiers a principal is known by, plus the random
//! source for human-facing unique codes.
//!
//! A principal has two kinds of identity:
//!
//! - its **unique code** ([`UniCode`]), e.g. `AB12-CD34-EF56-GH78`, which is
//!   the subject of every token issued to it;
//! - its **natural key** ([`NaturalKey`]), the contact identifier it logs in
//!   with (an email address, or a mobile number with country code).
//!
//! Natural keys are normalized at construction so that lookups and the
//! store's uniqueness constraints see one spelling per identifier.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::role::{Role, RoleCode};

/// Alphabet of unique-code characters.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Characters in a unique code, excluding separators.
const CODE_LEN: usize = 16;
/// Characters per dash-separated group.
const CODE_GROUP: usize = 4;

/// Store-assigned numeric principal id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalId(pub i64);

/// Human-facing unique code of a principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniCode(String);

impl UniCode {
    /// Wrap an existing code, e.g. one read from token claims or the store.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Draw a fresh candidate code from `rng`.
    ///
    /// The candidate is not checked for uniqueness; callers reject and redraw
    /// against their store.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut code = String::with_capacity(CODE_LEN + CODE_LEN / CODE_GROUP);
        for i in 0..CODE_LEN {
            if i > 0 && i % CODE_GROUP == 0 {
                code.push('-');
            }
            let idx = rng.gen_range(0..CODE_ALPHABET.len());
            code.push(CODE_ALPHABET[idx] as char);
        }
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UniCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of candidate unique codes.
pub trait CodeSource: Send + Sync {
    fn next_code(&self) -> UniCode;
}

/// Candidates from the thread-local OS-seeded generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodes;

impl CodeSource for RandomCodes {
    fn next_code(&self) -> UniCode {
        UniCode::random(&mut rand::thread_rng())
    }
}

/// Deterministic candidates from a seeded generator.
#[derive(Debug)]
pub struct SeededCodes {
    rng: Mutex<StdRng>,
}

impl SeededCodes {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl CodeSource for SeededCodes {
    fn next_code(&self) -> UniCode {
        UniCode::random(&mut *self.rng.lock())
    }
}

/// The contact identifier a principal logs in with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NaturalKey {
    Email(String),
    Mobile { mobile: String, country_code: String },
}

impl NaturalKey {
    /// Email key, trimmed and lowercased.
    pub fn email(raw: &str) -> Self {
        Self::Email(raw.trim().to_lowercase())
    }

    /// Mobile key with all whitespace removed from both parts.
    pub fn mobile(raw_mobile: &str, raw_country_code: &str) -> Self {
        Self::Mobile {
            mobile: strip_whitespace(raw_mobile),
            country_code: strip_whitespace(raw_country_code),
        }
    }

    /// Identifier used as the default nickname of a new principal.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Email(email) => email,
            Self::Mobile { mobile, .. } => mobile,
        }
    }
}

fn strip_whitespace(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// A principal as read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub uni_code: UniCode,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub country_code: Option<String>,
    pub nickname: String,
    /// Role codes bound to the principal, enabled or not.
    pub roles: Vec<RoleCode>,
    pub created_at: DateTime<Utc>,
}

impl Principal {
    /// Whether this principal is identified by `key`.
    pub fn matches(&self, key: &NaturalKey) -> bool {
        match key {
            NaturalKey::Email(email) => self.email.as_deref() == Some(email.as_str()),
            NaturalKey::Mobile {
                mobile,
                country_code,
            } => {
                self.mobile.as_deref() == Some(mobile.as_str())
                    && self.country_code.as_deref() == Some(country_code.as_str())
            }
        }
    }
}

/// Insert payload for a principal provisioned at first login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPrincipal {
    pub uni_code: UniCode,
    pub key: NaturalKey,
    pub nickname: String,
    pub role: Role,
}

impl NewPrincipal {
    /// A principal identified by `key`, nicknamed after it, bound to `role`.
    pub fn for_key(uni_code: UniCode, key: NaturalKey, role: Role) -> Self {
        let nickname = key.display_name().to_string();
        Self {
            uni_code,
            key,
            nickname,
            role,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match &self.key {
            NaturalKey::Email(email) => Some(email),
            NaturalKey::Mobile { .. } => None,
        }
    }

    pub fn mobile(&self) -> Option<(&str, &str)> {
        match &self.key {
            NaturalKey::Mobile {
                mobile,
                country_code,
            } => Some((mobile, country_code)),
            NaturalKey::Email(_) => None,
        }
    }
}
