//! Postgres-backed directory.

use async_trait::async_trait;
use common::error::DatabaseError;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use super::ProfileDirectory;
use crate::error::AuthError;
use crate::models::{NewProfile, ProfileRecord, RecordTable, Role, Session};

/// Reads record tables straight from the provider's Postgres
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileDirectory for PgDirectory {
    async fn fetch_record(
        &self,
        table: RecordTable,
        session: &Session,
    ) -> Result<ProfileRecord, AuthError> {
        debug!(
            "Fetching {} record for {}",
            table.table_name(),
            session.subject()
        );

        // Table names come from the closed RecordTable set, never from input.
        let query = format!(
            "SELECT role::text AS role, full_name FROM {} WHERE id = $1",
            table.table_name()
        );

        let row = sqlx::query(&query)
            .bind(session.subject())
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        match row {
            Some(row) => {
                let role: Option<String> = row.try_get("role").map_err(DatabaseError::Query)?;
                let full_name: Option<String> =
                    row.try_get("full_name").map_err(DatabaseError::Query)?;

                Ok(ProfileRecord {
                    role: Role::from_label(role.as_deref()),
                    full_name,
                })
            }
            None => Err(AuthError::NotFound),
        }
    }

    async fn insert_profile(
        &self,
        profile: &NewProfile,
        _access_token: Option<&str>,
    ) -> Result<(), AuthError> {
        info!("Creating profile for user: {}", profile.id);

        sqlx::query(
            r#"
            INSERT INTO profiles (id, email, full_name, role)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(profile.id)
        .bind(&profile.email)
        .bind(&profile.full_name)
        .bind(profile.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
