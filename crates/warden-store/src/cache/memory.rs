//! In-process cache honouring the [`CacheBackend`] contract.
//!
//! Expiry is evaluated against an injected [`Clock`], so tests can step over
//! TTL and rate-window boundaries without sleeping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use warden_core::{Clock, SystemClock};

use super::{CacheBackend, CacheError, Counter};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Thread-safe, cloneable in-memory cache.
///
/// The lock is `parking_lot` and never held across an `.await`.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .lock()
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries.
    pub fn evict_expired(&self) {
        let now = self.clock.now();
        self.entries.lock().retain(|_, entry| entry.expires_at > now);
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = expiry(self.clock.now(), ttl);
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<Counter, CacheError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let live = entries.get(key).filter(|entry| entry.expires_at > now).cloned();
        let (count, expires_at) = match live {
            Some(entry) => {
                let current: u64 = entry.value.parse().map_err(|_| {
                    CacheError::Malformed(format!("value at {key} is not an integer"))
                })?;
                (current.saturating_add(1), entry.expires_at)
            }
            None => (1, expiry(now, ttl)),
        };

        entries.insert(
            key.to_string(),
            Entry {
                value: count.to_string(),
                expires_at,
            },
        );

        let ttl = (expires_at - now).to_std().unwrap_or(Duration::ZERO);
        Ok(Counter { count, ttl })
    }
}
