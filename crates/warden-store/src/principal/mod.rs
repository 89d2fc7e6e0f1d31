//! # Principal Store
//!
//! Authoritative principal and role records.
//!
//! Lookups go straight to the store. Provisioning a new principal runs inside
//! a [`ProvisioningTx`]: every write is staged until [`ProvisioningTx::commit`]
//! and discarded if the transaction is dropped uncommitted, so a failed
//! provisioning leaves no partial principal behind.
//!
//! The store enforces uniqueness of unique codes and natural keys. A
//! concurrent insert of the same natural key surfaces as
//! [`StoreError::Conflict`], which the login flow resolves by re-reading.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use warden_core::{NaturalKey, NewPrincipal, Principal, Role, RoleCode, UniCode};

/// Store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("uniqueness conflict: {0}")]
    Conflict(String),

    /// The store could not be reached or the statement failed.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A stored row could not be mapped back into a domain value.
    #[error("corrupt store row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.constraint().unwrap_or("unique").to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Role bindings of a principal, the only store query the role cache needs.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Codes of the enabled roles bound to the principal with `code`.
    ///
    /// An unknown principal has no roles; this is not an error.
    async fn enabled_roles(&self, code: &UniCode) -> Result<Vec<RoleCode>, StoreError>;
}

/// Principal lookups, provisioning, and role seeding.
#[async_trait]
pub trait PrincipalStore: RoleStore {
    async fn find_by_natural_key(&self, key: &NaturalKey)
        -> Result<Option<Principal>, StoreError>;

    async fn find_by_code(&self, code: &UniCode) -> Result<Option<Principal>, StoreError>;

    /// Open a provisioning transaction.
    async fn begin(&self) -> Result<Box<dyn ProvisioningTx>, StoreError>;

    /// Insert any of `codes` not yet present as enabled roles.
    ///
    /// Returns how many were inserted.
    async fn ensure_roles(&self, codes: &[RoleCode]) -> Result<usize, StoreError>;
}

/// A scoped, all-or-nothing unit of provisioning work.
///
/// Dropping without [`commit`](ProvisioningTx::commit) rolls back.
#[async_trait]
pub trait ProvisioningTx: Send {
    /// Whether any principal already holds `code`.
    async fn code_exists(&mut self, code: &UniCode) -> Result<bool, StoreError>;

    /// The role record for `code`, enabled or not.
    async fn find_role(&mut self, code: RoleCode) -> Result<Option<Role>, StoreError>;

    /// Insert a principal and bind its role.
    ///
    /// Fails with [`StoreError::Conflict`] when the unique code or natural key
    /// is already taken.
    async fn create_principal(&mut self, new: &NewPrincipal) -> Result<Principal, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
