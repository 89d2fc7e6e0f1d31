//! Redis-backed [`CacheBackend`].
//!
//! Uses a multiplexed [`ConnectionManager`], which reconnects on its own
//! after a dropped connection. The counter increment runs as a Lua script so
//! that the INCR and the first-increment expiry are one atomic step.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{RedisError, Script};

use super::{CacheBackend, CacheError, Counter};

/// INCR, attach the window expiry on the first increment (or to a key that
/// lost its expiry), report PTTL.
const INCR_WITH_EXPIRY: &str = r#"
local count = redis.call('INCR', KEYS[1])
local ttl = redis.call('PTTL', KEYS[1])
if count == 1 or ttl == -1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {count, ttl}
"#;

impl From<RedisError> for CacheError {
    fn from(err: RedisError) -> Self {
        if err.kind() == redis::ErrorKind::TypeError {
            CacheError::Malformed(err.to_string())
        } else {
            CacheError::Unavailable(err.to_string())
        }
    }
}

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    incr: Script,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Open a managed connection to `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("redis cache connected");
        Ok(Self {
            conn,
            incr: Script::new(INCR_WITH_EXPIRY),
        })
    }
}

fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<Counter, CacheError> {
        let mut conn = self.conn.clone();
        let (count, pttl): (i64, i64) = self
            .incr
            .key(key)
            .arg(millis(ttl))
            .invoke_async(&mut conn)
            .await?;

        let count = u64::try_from(count)
            .map_err(|_| CacheError::Malformed(format!("negative counter at {key}")))?;
        // The script always leaves an expiry; a negative PTTL can only mean
        // the key vanished between calls.
        let ttl = match u64::try_from(pttl) {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => ttl,
        };
        Ok(Counter { count, ttl })
    }
}
