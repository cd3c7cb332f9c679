//! Role/name record directories.
//!
//! Two tables can hold a member's role and display name: `profiles`
//! (primary) and `users` (secondary). Backends:
//! - [`RestDirectory`] - the provider's PostgREST endpoints
//! - [`PgDirectory`] - direct SQL against the provider's Postgres

mod postgres;
mod rest;

use async_trait::async_trait;

pub use postgres::PgDirectory;
pub use rest::RestDirectory;

use crate::error::AuthError;
use crate::models::{NewProfile, ProfileRecord, RecordTable, Session};

/// Read/write access to the record tables
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// Look up the record keyed by the session's subject.
    ///
    /// A missing row is [`AuthError::NotFound`].
    async fn fetch_record(
        &self,
        table: RecordTable,
        session: &Session,
    ) -> Result<ProfileRecord, AuthError>;

    /// Insert a profile row; `access_token` is absent when sign-up did not
    /// yield a session
    async fn insert_profile(
        &self,
        profile: &NewProfile,
        access_token: Option<&str>,
    ) -> Result<(), AuthError>;

    /// Name of this directory backend
    fn name(&self) -> &str {
        "unknown"
    }
}
