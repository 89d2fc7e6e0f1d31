//! # warden-store — Cache and Principal Store Backends
//!
//! Warden talks to two external systems, each behind a narrow trait so that
//! either can be swapped independently:
//!
//! - [`CacheBackend`]: a shared key-value cache with per-key atomic
//!   get / set-with-TTL / increment-with-expiry. Used by the role cache and
//!   the rate limiter.
//! - [`PrincipalStore`]: the authoritative principal and role records,
//!   with a scoped [`ProvisioningTx`] for all-or-nothing principal creation.
//!   Its [`RoleStore`] supertrait is the only part the role cache needs.
//!
//! ## Backends
//!
//! | Trait            | In-memory                | Production          |
//! |------------------|--------------------------|---------------------|
//! | `CacheBackend`   | [`MemoryCache`]          | [`RedisCache`]      |
//! | `PrincipalStore` | [`MemoryPrincipalStore`] | [`PgPrincipalStore`]|
//!
//! The in-memory backends honour the same atomicity and uniqueness contracts
//! as the production ones and back the test suites and the development mode
//! of the binary.

pub mod cache;
pub mod principal;
pub mod seed;

pub use cache::memory::MemoryCache;
pub use cache::redis::RedisCache;
pub use cache::{CacheBackend, CacheError, Counter};
pub use principal::memory::MemoryPrincipalStore;
pub use principal::postgres::PgPrincipalStore;
pub use principal::{PrincipalStore, ProvisioningTx, RoleStore, StoreError};
pub use seed::seed_roles;
