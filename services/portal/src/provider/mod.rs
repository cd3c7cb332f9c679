//! Identity provider contract.
//!
//! The portal never mints sessions. It consumes them from a hosted
//! identity provider through the [`IdentityProvider`] trait:
//! - [`GoTrueClient`] - hosted GoTrue-compatible auth over HTTP

mod gotrue;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

pub use gotrue::{GoTrueClient, GoTrueFactory};

use crate::error::AuthError;
use crate::models::{IdentityUser, Session, UserMetadata};

/// Kind of provider state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// `(event, session)` pair emitted on every provider state change.
///
/// `seq` is assigned by the provider when the change is emitted and grows
/// by one per event; see [`IdentityProvider::event_seq`].
#[derive(Debug, Clone)]
pub struct AuthStateChange {
    pub seq: u64,
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthStateChange {
    pub fn new(seq: u64, event: AuthEvent, session: Option<Session>) -> Self {
        Self {
            seq,
            event,
            session,
        }
    }
}

/// Outcome of a sign-up: a session when the provider auto-confirms, the
/// bare identity when it waits for email confirmation
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: IdentityUser,
    pub session: Option<Session>,
}

/// Contract consumed from the hosted identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session, refreshed if it expired
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
    -> Result<Session, AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &UserMetadata,
    ) -> Result<SignUpOutcome, AuthError>;

    /// Invalidate the session with the provider
    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn reset_password_for_email(&self, email: &str) -> Result<(), AuthError>;

    async fn update_password(&self, new_password: &str) -> Result<IdentityUser, AuthError>;

    /// Drop the locally persisted session without contacting the provider
    async fn clear_local_session(&self) -> Result<(), AuthError>;

    /// Subscribe to state-change events
    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange>;

    /// Sequence number of the last emitted state change, 0 before the first
    fn event_seq(&self) -> u64;

    /// Name of this provider
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Creates the provider client for one browser session
pub trait ProviderFactory: Send + Sync {
    fn create(&self, portal_id: &str) -> Arc<dyn IdentityProvider>;
}

impl<F> ProviderFactory for F
where
    F: Fn(&str) -> Arc<dyn IdentityProvider> + Send + Sync,
{
    fn create(&self, portal_id: &str) -> Arc<dyn IdentityProvider> {
        self(portal_id)
    }
}
