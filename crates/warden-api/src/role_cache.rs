//! # Role Cache
//!
//! Cache-aside lookup of a principal's enabled roles, keyed
//! `auth:roles:{uniCode}`. A hit is served from the shared cache without
//! touching the store; a miss reads the store and writes the serialized role
//! list back with a five-minute TTL, so the cache never lags the store by
//! more than that.
//!
//! Backend failures are not masked: a cache error surfaces as an internal
//! error and the request is denied.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use warden_core::{ErrorKind, RoleCode, UniCode};
use warden_store::{CacheBackend, RoleStore};

use crate::error::AppError;

/// Lifetime of a cached role set.
pub const ROLE_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone)]
pub struct RoleCache {
    store: Arc<dyn RoleStore>,
    cache: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl std::fmt::Debug for RoleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleCache").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

pub fn cache_key(code: &UniCode) -> String {
    format!("auth:roles:{code}")
}

impl RoleCache {
    pub fn new(store: Arc<dyn RoleStore>, cache: Arc<dyn CacheBackend>) -> Self {
        Self {
            store,
            cache,
            ttl: ROLE_CACHE_TTL,
        }
    }

    /// Enabled roles of the principal with `code`.
    pub async fn get_roles(&self, code: &UniCode) -> Result<BTreeSet<RoleCode>, AppError> {
        let key = cache_key(code);

        let cached = self.cache.get(&key).await.map_err(|e| {
            tracing::error!(uni_code = %code, error = %e, "role cache read failed");
            AppError::from(e)
        })?;

        if let Some(raw) = cached {
            match serde_json::from_str::<Vec<RoleCode>>(&raw) {
                Ok(roles) => return Ok(roles.into_iter().collect()),
                Err(e) => {
                    tracing::warn!(uni_code = %code, error = %e, "discarding unreadable role cache entry");
                }
            }
        }

        let roles: BTreeSet<RoleCode> = self.store.enabled_roles(code).await?.into_iter().collect();

        let payload = serde_json::to_string(&roles)
            .map_err(|e| AppError::new(ErrorKind::InternalServerError).append(e.to_string()))?;
        self.cache.set_ex(&key, &payload, self.ttl).await.map_err(|e| {
            tracing::error!(uni_code = %code, error = %e, "role cache write failed");
            AppError::from(e)
        })?;

        Ok(roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingCache, CountingRoleStore, FailingCache};
    use warden_core::{ManualClock, NaturalKey};
    use warden_store::{MemoryCache, MemoryPrincipalStore};

    struct Fixture {
        cache: RoleCache,
        store: Arc<CountingRoleStore>,
        backend: Arc<CountingCache>,
        principals: MemoryPrincipalStore,
        clock: ManualClock,
        code: UniCode,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::starting_now();
        let principals = MemoryPrincipalStore::with_roles(&RoleCode::ALL);
        let code = UniCode::new("AAAA-BBBB-CCCC-DDDD");
        principals
            .insert_principal(
                code.clone(),
                &NaturalKey::email("a@example.com"),
                &[RoleCode::User, RoleCode::Admin],
            )
            .unwrap();

        let store = Arc::new(CountingRoleStore::new(Arc::new(principals.clone())));
        let backend = Arc::new(CountingCache::new(Arc::new(MemoryCache::new(Arc::new(
            clock.clone(),
        )))));
        Fixture {
            cache: RoleCache::new(store.clone(), backend.clone()),
            store,
            backend,
            principals,
            clock,
            code,
        }
    }

    #[tokio::test]
    async fn miss_reads_store_once_and_writes_cache_once() {
        let f = fixture();
        let roles = f.cache.get_roles(&f.code).await.unwrap();
        assert_eq!(roles, BTreeSet::from([RoleCode::Admin, RoleCode::User]));
        assert_eq!(f.store.lookups(), 1);
        assert_eq!(f.backend.writes(), 1);
    }

    #[tokio::test]
    async fn hit_within_ttl_skips_store() {
        let f = fixture();
        f.cache.get_roles(&f.code).await.unwrap();
        f.clock.advance(Duration::from_secs(299));
        let roles = f.cache.get_roles(&f.code).await.unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(f.store.lookups(), 1);
        assert_eq!(f.backend.writes(), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_refetched() {
        let f = fixture();
        f.cache.get_roles(&f.code).await.unwrap();
        f.principals.set_role_enabled(RoleCode::Admin, false);

        // Stale within TTL.
        assert!(f.cache.get_roles(&f.code).await.unwrap().contains(&RoleCode::Admin));

        f.clock.advance(ROLE_CACHE_TTL);
        let roles = f.cache.get_roles(&f.code).await.unwrap();
        assert_eq!(roles, BTreeSet::from([RoleCode::User]));
        assert_eq!(f.store.lookups(), 2);
    }

    #[tokio::test]
    async fn unknown_principal_caches_empty_set() {
        let f = fixture();
        let stranger = UniCode::new("ZZZZ-ZZZZ-ZZZZ-ZZZZ");
        assert!(f.cache.get_roles(&stranger).await.unwrap().is_empty());
        assert!(f.cache.get_roles(&stranger).await.unwrap().is_empty());
        assert_eq!(f.store.lookups(), 1);
    }

    #[tokio::test]
    async fn unreadable_entry_is_replaced() {
        let f = fixture();
        f.backend
            .set_ex(&cache_key(&f.code), "not json", ROLE_CACHE_TTL)
            .await
            .unwrap();
        let roles = f.cache.get_roles(&f.code).await.unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(f.store.lookups(), 1);
    }

    #[tokio::test]
    async fn cache_failure_fails_closed() {
        let f = fixture();
        let cache = RoleCache::new(f.store.clone(), Arc::new(FailingCache));
        let err = cache.get_roles(&f.code).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalServerError);
        assert_eq!(f.store.lookups(), 0);
    }

    #[test]
    fn key_format() {
        assert_eq!(
            cache_key(&UniCode::new("AAAA-BBBB-CCCC-DDDD")),
            "auth:roles:AAAA-BBBB-CCCC-DDDD"
        );
    }
}
