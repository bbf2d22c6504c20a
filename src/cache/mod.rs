//! Shared counter store client.
//!
//! Counters are keyed per user and bucket and expire with the bucket. The
//! increment and the TTL assignment must not race, so the increment runs as
//! a server-side script: INCR, then EXPIRE only when the post-increment
//! value is 1. Issuing the two commands separately from the client would
//! let a crash between them leave a counter with no expiry, pinning its
//! bucket forever.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{Script, Value};
use thiserror::Error;

use crate::config::RedisSettings;

const INCR_AND_EXPIRE_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 then
  redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return current
"#;

const RETRIES_PER_REQUEST: usize = 3;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Counter store failures.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("connect failed: {0}")]
    Connect(#[source] redis::RedisError),

    #[error("command failed for key {key}: {source}")]
    Command {
        key: String,
        #[source]
        source: redis::RedisError,
    },

    #[error("non-numeric result for key {key}")]
    NonNumeric { key: String },
}

/// Atomic windowed counters shared across all server instances.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment `key` by 1 (absent counts as 0) and, when the
    /// result is 1, set its TTL to `ttl_seconds`. Returns the
    /// post-increment value.
    async fn incr_and_expire(&self, key: &str, ttl_seconds: i64) -> Result<i64, CacheError>;

    /// Seconds until `key` expires; `-1` if it has no TTL, `-2` if absent.
    async fn ttl(&self, key: &str) -> Result<i64, CacheError>;

    /// Raw stored value, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
}

/// Redis-backed counter store over a managed, auto-reconnecting connection.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
    incr_script: Arc<Script>,
}

impl RedisCounterStore {
    /// Connect and verify the connection with a PING.
    pub async fn connect(settings: &RedisSettings) -> Result<Self, CacheError> {
        let client = redis::Client::open(settings.url()).map_err(CacheError::Connect)?;

        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(RETRIES_PER_REQUEST)
            .set_connection_timeout(CONNECT_TIMEOUT)
            .set_response_timeout(RESPONSE_TIMEOUT);

        let mut conn = ConnectionManager::new_with_config(client, config)
            .await
            .map_err(CacheError::Connect)?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(CacheError::Connect)?;

        Ok(Self {
            conn,
            incr_script: Arc::new(Script::new(INCR_AND_EXPIRE_SCRIPT)),
        })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr_and_expire(&self, key: &str, ttl_seconds: i64) -> Result<i64, CacheError> {
        let mut conn = self.conn.clone();
        let reply: Value = self
            .incr_script
            .key(key)
            .arg(ttl_seconds)
            .invoke_async(&mut conn)
            .await
            .map_err(|source| CacheError::Command {
                key: key.to_string(),
                source,
            })?;

        match reply {
            Value::Int(count) => Ok(count),
            _ => Err(CacheError::NonNumeric {
                key: key.to_string(),
            }),
        }
    }

    async fn ttl(&self, key: &str) -> Result<i64, CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("TTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|source| CacheError::Command {
                key: key.to_string(),
                source,
            })
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|source| CacheError::Command {
                key: key.to_string(),
                source,
            })
    }
}
