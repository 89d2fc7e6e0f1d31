//! # Shared Cache
//!
//! The cache contract both the role cache and the rate limiter rely on.
//! Every operation is atomic per key at the backend; callers do no locking
//! of their own.

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Cache backend failures. A miss is not an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The backend could not be reached or refused the command.
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    /// The stored value has the wrong shape for the command.
    #[error("cache value malformed: {0}")]
    Malformed(String),
}

/// Result of an atomic increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    /// Value after the increment.
    pub count: u64,
    /// Time until the counter expires.
    pub ttl: Duration,
}

/// Key-value cache with TTLs and atomic counters.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Read a value; `Ok(None)` on a miss.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Write a value that expires after `ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Increment a counter. A counter that did not exist starts at 1 and
    /// expires after `ttl`; incrementing an existing counter keeps its expiry.
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<Counter, CacheError>;
}
