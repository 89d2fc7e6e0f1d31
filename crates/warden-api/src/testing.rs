//! Test stand-ins for the cache and role store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use warden_core::{RoleCode, UniCode};
use warden_store::{CacheBackend, CacheError, Counter, RoleStore, StoreError};

/// A cache whose backend is always down.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingCache;

#[async_trait]
impl CacheBackend for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn incr_with_expiry(&self, _key: &str, _ttl: Duration) -> Result<Counter, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

/// Counts writes passing through to an inner cache.
pub struct CountingCache {
    inner: Arc<dyn CacheBackend>,
    writes: AtomicUsize,
}

impl CountingCache {
    pub fn new(inner: Arc<dyn CacheBackend>) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheBackend for CountingCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.inner.get(key).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_ex(key, value, ttl).await
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<Counter, CacheError> {
        self.inner.incr_with_expiry(key, ttl).await
    }
}

/// Counts role lookups passing through to an inner store.
pub struct CountingRoleStore {
    inner: Arc<dyn RoleStore>,
    lookups: AtomicUsize,
}

impl CountingRoleStore {
    pub fn new(inner: Arc<dyn RoleStore>) -> Self {
        Self {
            inner,
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoleStore for CountingRoleStore {
    async fn enabled_roles(&self, code: &UniCode) -> Result<Vec<RoleCode>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.enabled_roles(code).await
    }
}
