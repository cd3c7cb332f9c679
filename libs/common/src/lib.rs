//! Shared infrastructure for the concierge portal
//!
//! - [`database`]: PostgreSQL pool for the direct directory backend
//! - [`cache`]: Redis connection holding persisted provider sessions
//! - [`error`]: infrastructure error types
//!
//! ```rust,no_run
//! use common::cache::{RedisConfig, RedisPool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = RedisPool::new(&RedisConfig::from_env()?).await?;
//!     pool.set_json("portal_session:demo", &vec!["a", "b"], Some(60)).await?;
//!     let value: Option<Vec<String>> = pool.get_json("portal_session:demo").await?;
//!     println!("cached: {:?}", value);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod database;
pub mod error;
