//! Session manager: the portal's single point of contact with the
//! identity provider.
//!
//! Every path that learns about a session (explicit refresh, sign-in, and
//! the provider event listener) resolves it through
//! [`resolve_user_from_session`] and publishes the result to the shared
//! [`SessionContext`]. Explicit operations stamp their result with the
//! provider event sequence seen once their provider call returned; the
//! listener uses the sequence carried by the event itself.

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::context::{AuthState, NoticeLevel, Resolved, SessionContext, Stamp};
use crate::directory::ProfileDirectory;
use crate::error::{AuthError, SignInFailure};
use crate::models::{NewProfile, Role, Session, User, UserMetadata};
use crate::provider::{AuthStateChange, IdentityProvider};
use crate::resolver::resolve_user_from_session;
use crate::validation;

/// Resolves and publishes the current user for one portal
#[derive(Clone)]
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    directory: Arc<dyn ProfileDirectory>,
    context: SessionContext,
}

impl SessionManager {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        directory: Arc<dyn ProfileDirectory>,
        context: SessionContext,
    ) -> Self {
        Self {
            provider,
            directory,
            context,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    fn stamp(&self, ticket: u64) -> Stamp {
        Stamp {
            epoch: self.provider.event_seq(),
            ticket,
        }
    }

    async fn resolve(&self, session: &Session) -> Resolved {
        Resolved {
            user: resolve_user_from_session(session, self.directory.as_ref()).await,
            expires_at: session.expires_at,
        }
    }

    /// Re-read the provider session and publish the resolved user.
    ///
    /// Never fails: provider errors are logged and leave no user.
    pub async fn refresh_session(&self) {
        let ticket = self.context.ticket();
        let session = self.provider.get_session().await;
        let stamp = self.stamp(ticket);

        let resolved = match session {
            Ok(Some(session)) => Some(self.resolve(&session).await),
            Ok(None) => None,
            Err(e) => {
                error!("Failed to retrieve session: {}", e);
                None
            }
        };

        self.context.apply(stamp, resolved);
    }

    /// Re-check the session with the provider once it is within
    /// `margin_secs` of expiry, then return the current state.
    ///
    /// An expired session is refreshed; a rejected refresh clears the user.
    pub async fn revalidate(&self, margin_secs: i64) -> AuthState {
        if self.context.expires_within(margin_secs) {
            info!("Session about to expire, re-checking with {}", self.provider.name());
            self.refresh_session().await;
        }
        self.context.state()
    }

    /// Password sign-in.
    ///
    /// The locally persisted session is dropped first; a failed attempt
    /// therefore always ends with no user.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, SignInFailure> {
        let ticket = self.context.ticket();

        if let Err(e) = self.provider.clear_local_session().await {
            warn!("Failed to clear local session before sign-in: {}", e);
        }

        let outcome = self.provider.sign_in_with_password(email, password).await;
        let stamp = self.stamp(ticket);

        match outcome {
            Ok(session) => {
                let resolved = self.resolve(&session).await;
                let user = resolved.user.clone();
                info!("Signed in {} as {}", user.id, user.role);
                self.context.apply(stamp, Some(resolved));
                Ok(user)
            }
            Err(e) => {
                warn!("Sign-in failed for {}: {}", email, e);
                self.context.apply(stamp, None);
                Err(SignInFailure::from(&e))
            }
        }
    }

    /// Create an account with the member role embedded in its metadata,
    /// then best-effort create the matching profile record
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<(), AuthError> {
        validation::validate_email(email).map_err(AuthError::Validation)?;
        validation::validate_password(password).map_err(AuthError::Validation)?;
        validation::validate_full_name(full_name).map_err(AuthError::Validation)?;

        let metadata = UserMetadata::for_new_member(full_name.trim());
        let outcome = self.provider.sign_up(email, password, &metadata).await?;

        let profile = NewProfile {
            id: outcome.user.id,
            email: email.to_string(),
            full_name: full_name.trim().to_string(),
            role: Role::Member,
        };
        let access_token = outcome.session.as_ref().map(|s| s.access_token.as_str());

        // The metadata tier still resolves this account without a profile row.
        if let Err(e) = self.directory.insert_profile(&profile, access_token).await {
            warn!("Failed to create profile for {}: {}", profile.id, e);
            self.context.push_notice(
                NoticeLevel::Error,
                "Your account was created, but your profile could not be saved.",
            );
        }

        Ok(())
    }

    /// Sign out with the provider and clear the user.
    ///
    /// Provider failures only produce a notice; the user is cleared either way.
    pub async fn sign_out(&self) {
        let ticket = self.context.ticket();

        if let Err(e) = self.provider.sign_out().await {
            warn!("Provider sign-out failed: {}", e);
            if let Err(e) = self.provider.clear_local_session().await {
                warn!("Failed to clear local session: {}", e);
            }
            self.context.push_notice(
                NoticeLevel::Error,
                "We could not reach the server, but you have been signed out on this device.",
            );
        }

        let stamp = self.stamp(ticket);
        self.context.apply(stamp, None);
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        validation::validate_email(email).map_err(AuthError::Validation)?;
        self.provider.reset_password_for_email(email).await
    }

    pub async fn update_password(&self, new_password: &str) -> Result<(), AuthError> {
        validation::validate_password(new_password).map_err(AuthError::Validation)?;
        self.provider.update_password(new_password).await?;
        Ok(())
    }

    /// Apply one provider state change.
    ///
    /// The change ranks by the sequence it was emitted with, so an event
    /// still queued when a later operation lands is dropped.
    pub async fn handle_state_change(&self, change: AuthStateChange) {
        let stamp = Stamp {
            epoch: change.seq,
            ticket: self.context.ticket(),
        };
        info!("Provider state change: {:?} (seq {})", change.event, change.seq);

        let resolved = match &change.session {
            Some(session) => Some(self.resolve(session).await),
            None => None,
        };

        self.context.apply(stamp, resolved);
    }

    /// Follow provider state changes until the provider goes away
    pub fn spawn_listener(&self) -> JoinHandle<()> {
        let mut events = self.provider.subscribe();
        let manager = self.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(change) => manager.handle_state_change(change).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Missed {} provider events, re-reading session", missed);
                        manager.refresh_session().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
