//! # Application State
//!
//! Every collaborator is constructed by the caller and handed in through
//! [`Collaborators`]; nothing here reaches for process-wide singletons.
//! `AppState` is cheap to clone: all fields are `Arc`s or wrap them.

use std::sync::Arc;

use warden_core::{Clock, CodeSource, RandomCodes, RoleCode, SystemClock, TokenService};
use warden_store::{CacheBackend, MemoryCache, MemoryPrincipalStore, PrincipalStore, RoleStore};

use crate::access::AccessControl;
use crate::config::AppConfig;
use crate::login::{FixedCodeVerifier, LoginOrchestrator};
use crate::middleware::rate_limit::RateLimiter;
use crate::role_cache::RoleCache;

/// External collaborators the service depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub principals: Arc<dyn PrincipalStore>,
    /// Role side of the principal store, used by the role cache.
    pub roles: Arc<dyn RoleStore>,
    pub cache: Arc<dyn CacheBackend>,
    pub clock: Arc<dyn Clock>,
    pub codes: Arc<dyn CodeSource>,
}

impl Collaborators {
    /// Wire one store as both the principal and role collaborator.
    pub fn new<S>(store: Arc<S>, cache: Arc<dyn CacheBackend>, clock: Arc<dyn Clock>) -> Self
    where
        S: PrincipalStore + 'static,
    {
        Self {
            principals: store.clone(),
            roles: store,
            cache,
            clock,
            codes: Arc::new(RandomCodes),
        }
    }

    /// In-memory store (with every role seeded) and cache on the system clock.
    pub fn in_memory() -> Self {
        Self::in_memory_with_clock(Arc::new(SystemClock))
    }

    pub fn in_memory_with_clock(clock: Arc<dyn Clock>) -> Self {
        let store = MemoryPrincipalStore::new(clock.clone());
        for role in RoleCode::ALL {
            store.set_role_enabled(role, true);
        }
        Self::new(
            Arc::new(store),
            Arc::new(MemoryCache::new(clock.clone())),
            clock,
        )
    }

    pub fn with_codes(mut self, codes: Arc<dyn CodeSource>) -> Self {
        self.codes = codes;
        self
    }
}

/// Shared application state, injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenService>,
    pub principals: Arc<dyn PrincipalStore>,
    pub roles: RoleCache,
    pub access: AccessControl,
    pub limiter: RateLimiter,
    pub login: Arc<LoginOrchestrator>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(config: AppConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            principals,
            roles,
            cache,
            clock,
            codes,
        } = collaborators;

        let tokens = Arc::new(TokenService::new(
            config.jwt.issuer.clone(),
            &config.jwt.token_secret,
            config.jwt.token_lifetimes.clone(),
            clock,
        ));
        let role_cache = RoleCache::new(roles, cache.clone());
        let login = LoginOrchestrator::new(
            principals.clone(),
            tokens.clone(),
            codes,
            Arc::new(FixedCodeVerifier::new(config.login.verification_code.clone())),
        );
        let limiter =
            RateLimiter::new(cache).with_trusted_proxies(config.rate_limit.trusted_proxies.clone());

        Self {
            config: Arc::new(config),
            tokens,
            principals,
            access: AccessControl::new(role_cache.clone()),
            roles: role_cache,
            limiter,
            login: Arc::new(login),
        }
    }

    /// Fully in-memory state, for development and tests.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(config, Collaborators::in_memory())
    }
}
