//! Session storage backends for persisting provider sessions.
//!
//! Provides the [`SessionStorage`] trait and implementations:
//! - [`MemorySessionStorage`] - In-memory (single instance, testing)
//! - [`RedisSessionStorage`] - Redis with TTL, survives restarts

mod memory;
mod redis;

use async_trait::async_trait;

pub use memory::MemorySessionStorage;
pub use redis::RedisSessionStorage;

use crate::error::AuthError;
use crate::models::Session;

/// Key a browser session's provider session is stored under
pub fn storage_key(portal_id: &str) -> String {
    format!("portal_session:{}", portal_id)
}

/// Trait for session storage backends
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<Session>, AuthError>;

    async fn save(&self, key: &str, session: &Session) -> Result<(), AuthError>;

    async fn remove(&self, key: &str) -> Result<(), AuthError>;

    /// Name of this storage backend
    fn name(&self) -> &str {
        "unknown"
    }
}
