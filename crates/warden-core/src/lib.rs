//! # warden-core — Foundational Types for Warden
//!
//! Warden is a trust-and-access core: signed identity tokens with sliding
//! renewal, role-based authorization, request admission control, and
//! login-time principal provisioning. This crate holds the pieces every
//! other crate shares and that need no I/O.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `UniCode` and
//!    `NaturalKey` have normalizing constructors. No bare strings for
//!    principal identifiers.
//!
//! 2. **Single error-kind registry.** Every error the service can surface
//!    is an [`ErrorKind`] with a numeric code, HTTP status, and default
//!    message assigned in exactly one place.
//!
//! 3. **Injected time.** Everything that reads the clock takes a
//!    [`Clock`]; tests drive a [`ManualClock`].
//!
//! 4. **Stateless tokens.** [`TokenService`] validity is decided by the
//!    signature and the claim timestamps alone.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `warden-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod device;
pub mod error;
pub mod identity;
pub mod role;
pub mod temporal;
pub mod token;

// Re-export primary types for ergonomic imports.
pub use device::{DeviceClass, TokenLifetimes};
pub use error::ErrorKind;
pub use identity::{
    CodeSource, NaturalKey, NewPrincipal, Principal, PrincipalId, RandomCodes, SeededCodes,
    UniCode,
};
pub use role::{role_check, Role, RoleCheckMode, RoleCode};
pub use temporal::{Clock, ManualClock, SystemClock};
pub use token::{Claims, TokenError, TokenSecret, TokenService};
