//! PostgREST-backed directory.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use tracing::debug;

use super::ProfileDirectory;
use crate::config::ProviderConfig;
use crate::error::AuthError;
use crate::models::{NewProfile, ProfileRecord, RecordTable, Session};

/// Ask PostgREST for exactly one object; zero rows answer 406
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Reads record tables through the provider's REST endpoints, under the
/// member's own access token so row-level security applies
#[derive(Clone)]
pub struct RestDirectory {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl RestDirectory {
    pub fn new(config: ProviderConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AuthError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    fn request(&self, method: Method, table: &str, bearer: Option<&str>) -> RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.config.base_url(), table);
        self.http
            .request(method, url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer.unwrap_or(self.config.anon_key.as_str()))
    }
}

#[async_trait]
impl ProfileDirectory for RestDirectory {
    async fn fetch_record(
        &self,
        table: RecordTable,
        session: &Session,
    ) -> Result<ProfileRecord, AuthError> {
        let table_name = table.table_name();
        debug!("Fetching {} record for {}", table_name, session.subject());

        let id_filter = format!("eq.{}", session.subject());
        let response = self
            .request(Method::GET, table_name, Some(session.access_token.as_str()))
            .header(reqwest::header::ACCEPT, SINGLE_OBJECT)
            .query(&[("select", "role,full_name"), ("id", id_filter.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_ACCEPTABLE {
            return Err(AuthError::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::from_provider_response(status.as_u16(), &body));
        }

        Ok(response.json::<ProfileRecord>().await?)
    }

    async fn insert_profile(
        &self,
        profile: &NewProfile,
        access_token: Option<&str>,
    ) -> Result<(), AuthError> {
        let response = self
            .request(
                Method::POST,
                RecordTable::Profiles.table_name(),
                access_token,
            )
            .header("Prefer", "return=minimal")
            .json(profile)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::from_provider_response(status.as_u16(), &body));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "rest"
    }
}
