//! Redis-backed session storage.

use async_trait::async_trait;
use common::cache::RedisPool;
use common::error::CacheError;
use tracing::warn;

use super::SessionStorage;
use crate::error::AuthError;
use crate::models::Session;

/// Persists provider sessions as JSON in Redis.
///
/// Entries expire after `ttl_seconds`, which should match the provider's
/// refresh token lifetime.
#[derive(Clone)]
pub struct RedisSessionStorage {
    pool: RedisPool,
    ttl_seconds: u64,
}

impl RedisSessionStorage {
    pub fn new(pool: RedisPool, ttl_seconds: u64) -> Self {
        Self { pool, ttl_seconds }
    }
}

#[async_trait]
impl SessionStorage for RedisSessionStorage {
    async fn load(&self, key: &str) -> Result<Option<Session>, AuthError> {
        match self.pool.get_json::<Session>(key).await {
            Ok(session) => Ok(session),
            Err(CacheError::Encoding(e)) => {
                warn!("Discarding unreadable session under {}: {}", key, e);
                self.remove(key).await?;
                Ok(None)
            }
            Err(e) => Err(AuthError::Storage(e.to_string())),
        }
    }

    async fn save(&self, key: &str, session: &Session) -> Result<(), AuthError> {
        self.pool
            .set_json(key, session, Some(self.ttl_seconds))
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.pool
            .delete(key)
            .await
            .map(|_| ())
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    fn name(&self) -> &str {
        "redis"
    }
}
