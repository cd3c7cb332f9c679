//! Infrastructure error types shared by the services

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Errors raised by the Redis cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis connection error: {0}")]
    Connection(#[source] redis::RedisError),

    #[error("Redis connection timed out after {0}s")]
    Timeout(u64),

    #[error("Redis command error: {0}")]
    Command(#[source] redis::RedisError),

    /// A cached value could not be (de)serialized
    #[error("Cache encoding error: {0}")]
    Encoding(#[source] serde_json::Error),

    #[error("Cache configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

pub type CacheResult<T> = Result<T, CacheError>;
