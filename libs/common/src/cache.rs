//! Redis cache module
//!
//! Persisted portal sessions live here as JSON documents under a
//! namespaced key with a TTL. One multiplexed connection is opened at
//! startup and shared by every clone of the pool.

use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{CacheError, CacheResult};

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Prepended to every key as `{prefix}:{key}`
    pub key_prefix: String,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    /// - `REDIS_KEY_PREFIX`: key namespace (default: "portal")
    /// - `REDIS_CONNECT_TIMEOUT`: connection timeout in seconds (default: 5)
    pub fn from_env() -> CacheResult<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let key_prefix = std::env::var("REDIS_KEY_PREFIX").unwrap_or_else(|_| "portal".to_string());
        let connect_timeout = std::env::var("REDIS_CONNECT_TIMEOUT")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|_| {
                CacheError::Configuration("REDIS_CONNECT_TIMEOUT must be a number".to_string())
            })?;

        if key_prefix.contains(char::is_whitespace) {
            return Err(CacheError::Configuration(
                "REDIS_KEY_PREFIX must not contain whitespace".to_string(),
            ));
        }

        Ok(RedisConfig {
            url,
            key_prefix,
            connect_timeout,
        })
    }
}

/// Shared Redis connection with namespaced JSON helpers
#[derive(Clone)]
pub struct RedisPool {
    connection: MultiplexedConnection,
    key_prefix: String,
}

impl RedisPool {
    /// Open the shared connection
    pub async fn new(config: &RedisConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.as_str()).map_err(CacheError::Connection)?;

        let connection = tokio::time::timeout(
            Duration::from_secs(config.connect_timeout),
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| CacheError::Timeout(config.connect_timeout))?
        .map_err(CacheError::Connection)?;

        info!("Redis connection established (prefix: {})", config.key_prefix);
        Ok(RedisPool {
            connection,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }

    /// Store `value` as JSON, expiring after `ttl_seconds` when given
    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> CacheResult<()> {
        let raw = serde_json::to_string(value).map_err(CacheError::Encoding)?;
        let key = self.key(key);
        let mut conn = self.connection.clone();

        match ttl_seconds {
            Some(ttl) => conn.set_ex::<_, _, ()>(&key, raw, ttl).await,
            None => conn.set::<_, _, ()>(&key, raw).await,
        }
        .map_err(CacheError::Command)?;

        debug!("Stored {}", key);
        Ok(())
    }

    /// Read a JSON value.
    ///
    /// A present but undecodable entry is [`CacheError::Encoding`]; callers
    /// decide whether to drop it.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(self.key(key)).await.map_err(CacheError::Command)?;

        raw.map(|raw| serde_json::from_str(&raw).map_err(CacheError::Encoding))
            .transpose()
    }

    /// Delete a key; returns whether it existed
    pub async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        let removed: u64 = conn.del(self.key(key)).await.map_err(CacheError::Command)?;
        Ok(removed > 0)
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(CacheError::Command)?;
        Ok(pong == "PONG")
    }
}
