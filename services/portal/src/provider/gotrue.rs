//! GoTrue-compatible hosted auth over HTTP.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{AuthEvent, AuthStateChange, IdentityProvider, ProviderFactory, SignUpOutcome};
use crate::config::ProviderConfig;
use crate::error::AuthError;
use crate::jwt::TokenVerifier;
use crate::models::{IdentityUser, Session, UserMetadata};
use crate::storage::{SessionStorage, storage_key};

const EVENT_CAPACITY: usize = 16;

/// Token grant response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: IdentityUser,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        let expires_at = token
            .expires_at
            .unwrap_or_else(|| Utc::now().timestamp() + token.expires_in);

        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user,
        }
    }
}

/// Sign-up answers with a full session when the project auto-confirms
/// and with the bare user otherwise
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(IdentityUser),
}

/// Client for one browser session's provider session
pub struct GoTrueClient {
    http: reqwest::Client,
    config: ProviderConfig,
    storage: Arc<dyn SessionStorage>,
    storage_key: String,
    verifier: TokenVerifier,
    events: broadcast::Sender<AuthStateChange>,
    seq: AtomicU64,
}

impl GoTrueClient {
    pub fn new(
        http: reqwest::Client,
        config: ProviderConfig,
        storage: Arc<dyn SessionStorage>,
        storage_key: String,
    ) -> Self {
        let verifier = TokenVerifier::new(config.jwt_secret.as_deref());
        if !verifier.is_enabled() {
            debug!("No JWT secret configured, stored tokens are checked by expiry only");
        }
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            http,
            config,
            storage,
            storage_key,
            verifier,
            events,
            seq: AtomicU64::new(0),
        }
    }

    fn request(&self, method: Method, path: &str, bearer: Option<&str>) -> RequestBuilder {
        let url = format!("{}/auth/v1/{}", self.config.base_url(), path);
        self.http
            .request(method, url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer.unwrap_or(self.config.anon_key.as_str()))
    }

    async fn check(response: Response) -> Result<Response, AuthError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(AuthError::from_provider_response(status.as_u16(), &body))
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, AuthError> {
        let response = Self::check(request.send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    fn emit(&self, event: AuthEvent, session: Option<Session>) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Provider event {:?} (seq {})", event, seq);
        // Sending only fails when nobody subscribed.
        let _ = self.events.send(AuthStateChange::new(seq, event, session));
    }

    async fn persist(&self, session: &Session) -> Result<(), AuthError> {
        self.storage.save(&self.storage_key, session).await
    }

    /// Whether a stored session must be refreshed before use
    fn needs_refresh(&self, session: &Session) -> bool {
        if session.expires_within(self.config.refresh_margin_secs) {
            return true;
        }
        if !self.verifier.is_enabled() {
            return false;
        }

        match self.verifier.verify(&session.access_token) {
            Ok(Some(claims)) => claims.sub != session.subject(),
            Ok(None) => false,
            Err(e) => {
                warn!("Stored access token failed verification: {}", e);
                true
            }
        }
    }

    async fn refresh(&self, session: Session) -> Result<Session, AuthError> {
        info!("Refreshing session for user: {}", session.subject());

        let request = self
            .request(Method::POST, "token", None)
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": session.refresh_token }));

        match Self::send_json::<TokenResponse>(request).await {
            Ok(token) => {
                let refreshed = Session::from(token);
                debug!("Session refreshed, valid for {}s", refreshed.remaining_secs());
                self.persist(&refreshed).await?;
                self.emit(AuthEvent::TokenRefreshed, Some(refreshed.clone()));
                Ok(refreshed)
            }
            // Keep the stored session: the refresh can be retried once the provider is back.
            Err(e) if e.is_network_error() => Err(e),
            Err(e) => {
                warn!("Session refresh rejected, signing out locally: {}", e);
                if let Err(remove_err) = self.storage.remove(&self.storage_key).await {
                    warn!("Failed to drop rejected session: {}", remove_err);
                }
                self.emit(AuthEvent::SignedOut, None);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(session) = self.storage.load(&self.storage_key).await? else {
            return Ok(None);
        };

        if self.needs_refresh(&session) {
            return self.refresh(session).await.map(Some);
        }

        Ok(Some(session))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        info!("Password sign-in for: {}", email);

        let request = self
            .request(Method::POST, "token", None)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));

        let session = Session::from(Self::send_json::<TokenResponse>(request).await?);
        self.persist(&session).await?;
        self.emit(AuthEvent::SignedIn, Some(session.clone()));

        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &UserMetadata,
    ) -> Result<SignUpOutcome, AuthError> {
        info!("Creating account for: {}", email);

        let request = self.request(Method::POST, "signup", None).json(&json!({
            "email": email,
            "password": password,
            "data": metadata,
        }));

        match Self::send_json::<SignUpResponse>(request).await? {
            SignUpResponse::Session(token) => {
                let session = Session::from(token);
                self.persist(&session).await?;
                self.emit(AuthEvent::SignedIn, Some(session.clone()));
                Ok(SignUpOutcome {
                    user: session.user.clone(),
                    session: Some(session),
                })
            }
            SignUpResponse::User(user) => Ok(SignUpOutcome {
                user,
                session: None,
            }),
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let result = match self.storage.load(&self.storage_key).await {
            Ok(Some(session)) => {
                let request =
                    self.request(Method::POST, "logout", Some(session.access_token.as_str()));
                match request.send().await {
                    // An already revoked or unknown session is as good as signed out.
                    Ok(response) if matches!(response.status().as_u16(), 401 | 403 | 404) => Ok(()),
                    Ok(response) => Self::check(response).await.map(|_| ()),
                    Err(e) => Err(AuthError::from(e)),
                }
            }
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };

        // Listeners hear about the sign-out even when storage is unavailable.
        let removed = self.storage.remove(&self.storage_key).await;
        self.emit(AuthEvent::SignedOut, None);

        result.and(removed)
    }

    async fn reset_password_for_email(&self, email: &str) -> Result<(), AuthError> {
        info!("Password reset requested for: {}", email);

        let mut request = self
            .request(Method::POST, "recover", None)
            .json(&json!({ "email": email }));
        if let Some(redirect_to) = &self.config.reset_redirect_url {
            request = request.query(&[("redirect_to", redirect_to)]);
        }

        Self::check(request.send().await?).await?;
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<IdentityUser, AuthError> {
        let session = self.get_session().await?.ok_or(AuthError::NotAuthenticated)?;
        info!("Updating password for user: {}", session.subject());

        let request = self
            .request(Method::PUT, "user", Some(session.access_token.as_str()))
            .json(&json!({ "password": new_password }));
        let user = Self::send_json::<IdentityUser>(request).await?;

        let updated = Session {
            user: user.clone(),
            ..session
        };
        self.persist(&updated).await?;
        self.emit(AuthEvent::UserUpdated, Some(updated));

        Ok(user)
    }

    async fn clear_local_session(&self) -> Result<(), AuthError> {
        self.storage.remove(&self.storage_key).await
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }

    fn event_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "gotrue"
    }
}

/// Builds one [`GoTrueClient`] per browser session, sharing the HTTP
/// client and session storage
#[derive(Clone)]
pub struct GoTrueFactory {
    http: reqwest::Client,
    config: ProviderConfig,
    storage: Arc<dyn SessionStorage>,
}

impl GoTrueFactory {
    pub fn new(
        config: ProviderConfig,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AuthError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            storage,
        })
    }
}

impl ProviderFactory for GoTrueFactory {
    fn create(&self, portal_id: &str) -> Arc<dyn IdentityProvider> {
        Arc::new(GoTrueClient::new(
            self.http.clone(),
            self.config.clone(),
            self.storage.clone(),
            storage_key(portal_id),
        ))
    }
}
