//! Portal configuration
//!
//! Loaded from defaults overlaid with `PORTAL_`-prefixed environment
//! variables; nested keys use `__` (e.g. `PORTAL_PROVIDER__URL`).

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

/// Where role/name records are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryBackend {
    /// PostgREST endpoints of the hosted provider
    Rest,
    /// Direct connection to the provider's Postgres
    Postgres,
}

/// Where provider sessions are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreBackend {
    Memory,
    Redis,
}

/// Hosted identity provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Project URL, e.g. `https://abc.supabase.co`
    pub url: String,
    /// Public anon key sent as `apikey`
    pub anon_key: String,
    /// Project JWT secret; enables access token verification
    #[serde(default)]
    pub jwt_secret: Option<String>,
    /// Where password reset emails link back to
    #[serde(default)]
    pub reset_redirect_url: Option<String>,
    pub request_timeout_secs: u64,
    /// Sessions this close to expiry are refreshed before use
    pub refresh_margin_secs: i64,
    /// Lifetime of persisted sessions (refresh token lifetime)
    pub session_ttl_secs: u64,
}

impl ProviderConfig {
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Portal service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    pub listen_addr: String,
    /// Cookie carrying the browser session id
    pub cookie_name: String,
    pub directory: DirectoryBackend,
    pub session_store: SessionStoreBackend,
    /// How long a guarded request waits for the first resolution
    pub loading_wait_ms: u64,
    /// Portals idle for longer than this are evicted
    pub idle_secs: u64,
    pub provider: ProviderConfig,
}

impl PortalConfig {
    /// Create a new PortalConfig from environment variables
    ///
    /// # Environment Variables
    /// - `PORTAL_PROVIDER__URL`: provider project URL (required)
    /// - `PORTAL_PROVIDER__ANON_KEY`: provider anon key (required)
    /// - `PORTAL_PROVIDER__JWT_SECRET`: enables access token verification
    /// - `PORTAL_PROVIDER__RESET_REDIRECT_URL`: password reset landing page
    /// - `PORTAL_PROVIDER__REQUEST_TIMEOUT_SECS` (default: 10)
    /// - `PORTAL_PROVIDER__REFRESH_MARGIN_SECS` (default: 10)
    /// - `PORTAL_PROVIDER__SESSION_TTL_SECS` (default: 604800)
    /// - `PORTAL_LISTEN_ADDR` (default: "0.0.0.0:3000")
    /// - `PORTAL_COOKIE_NAME` (default: "portal_sid")
    /// - `PORTAL_DIRECTORY`: `rest` or `postgres` (default: rest)
    /// - `PORTAL_SESSION_STORE`: `memory` or `redis` (default: memory)
    /// - `PORTAL_LOADING_WAIT_MS` (default: 1500)
    /// - `PORTAL_IDLE_SECS` (default: 1800)
    pub fn from_env() -> Result<Self> {
        let settings = ::config::Config::builder()
            .set_default("listen_addr", "0.0.0.0:3000")?
            .set_default("cookie_name", "portal_sid")?
            .set_default("directory", "rest")?
            .set_default("session_store", "memory")?
            .set_default("loading_wait_ms", 1500_i64)?
            .set_default("idle_secs", 1800_i64)?
            .set_default("provider.request_timeout_secs", 10_i64)?
            .set_default("provider.refresh_margin_secs", 10_i64)?
            .set_default("provider.session_ttl_secs", 604_800_i64)?
            .add_source(
                ::config::Environment::with_prefix("PORTAL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: PortalConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.provider.url.trim().is_empty() {
            anyhow::bail!("PORTAL_PROVIDER__URL must not be empty");
        }
        if !self.provider.url.starts_with("http://") && !self.provider.url.starts_with("https://")
        {
            anyhow::bail!("PORTAL_PROVIDER__URL must be an http(s) URL");
        }
        if self.provider.anon_key.trim().is_empty() {
            anyhow::bail!("PORTAL_PROVIDER__ANON_KEY must not be empty");
        }
        if self.cookie_name.trim().is_empty() {
            anyhow::bail!("PORTAL_COOKIE_NAME must not be empty");
        }
        Ok(())
    }

    pub fn loading_wait(&self) -> Duration {
        Duration::from_millis(self.loading_wait_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}
