//! Shared fakes for portal integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

use portal::AppState;
use portal::directory::ProfileDirectory;
use portal::error::AuthError;
use portal::models::{
    IdentityUser, NewProfile, ProfileRecord, RecordTable, Role, Session, UserMetadata,
};
use portal::portal::PortalRegistry;
use portal::provider::{
    AuthEvent, AuthStateChange, IdentityProvider, ProviderFactory, SignUpOutcome,
};

pub const PASSWORD: &str = "correct horse";

pub fn identity(email: &str, metadata: UserMetadata) -> IdentityUser {
    IdentityUser {
        id: Uuid::new_v4(),
        email: Some(email.to_string()),
        user_metadata: metadata,
    }
}

pub fn session_for(user: IdentityUser) -> Session {
    expiring_session_for(user, 3600)
}

pub fn expiring_session_for(user: IdentityUser, expires_in: i64) -> Session {
    Session {
        access_token: format!("access-{}", user.id),
        refresh_token: format!("refresh-{}", user.id),
        expires_at: chrono::Utc::now().timestamp() + expires_in,
        user,
    }
}

/// Refresh margin used by the fake provider and the test app state
pub const REFRESH_MARGIN_SECS: i64 = 10;

pub fn record(role: Role, full_name: Option<&str>) -> ProfileRecord {
    ProfileRecord {
        role,
        full_name: full_name.map(str::to_string),
    }
}

/// Provider that keeps its session in memory and accepts one account
pub struct FakeProvider {
    account: Session,
    session: Mutex<Option<Session>>,
    offline: AtomicBool,
    sign_out_fails: AtomicBool,
    refresh_revoked: AtomicBool,
    refreshes: AtomicUsize,
    cleared: AtomicUsize,
    events: broadcast::Sender<AuthStateChange>,
    seq: AtomicU64,
}

impl FakeProvider {
    pub fn new(account: Session) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            account,
            session: Mutex::new(None),
            offline: AtomicBool::new(false),
            sign_out_fails: AtomicBool::new(false),
            refresh_revoked: AtomicBool::new(false),
            refreshes: AtomicUsize::new(0),
            cleared: AtomicUsize::new(0),
            events,
            seq: AtomicU64::new(0),
        })
    }

    pub fn account(&self) -> &Session {
        &self.account
    }

    pub fn set_session(&self, session: Option<Session>) {
        *self.session.lock().unwrap() = session;
    }

    pub fn stored_session(&self) -> Option<Session> {
        self.session.lock().unwrap().clone()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn fail_sign_out(&self) {
        self.sign_out_fails.store(true, Ordering::SeqCst);
    }

    pub fn local_clears(&self) -> usize {
        self.cleared.load(Ordering::SeqCst)
    }

    /// Reject every refresh grant, as after the refresh token was revoked
    pub fn revoke_refresh_token(&self) {
        self.refresh_revoked.store(true, Ordering::SeqCst);
    }

    pub fn refresh_attempts(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Push a state change as the provider would; returns its sequence number
    pub fn emit(&self, event: AuthEvent, session: Option<Session>) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.events.send(AuthStateChange::new(seq, event, session));
        seq
    }

    fn check_online(&self) -> Result<(), AuthError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AuthError::Network("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        self.check_online()?;

        let Some(session) = self.stored_session() else {
            return Ok(None);
        };
        if !session.expires_within(REFRESH_MARGIN_SECS) {
            return Ok(Some(session));
        }

        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.refresh_revoked.load(Ordering::SeqCst) {
            self.set_session(None);
            self.emit(AuthEvent::SignedOut, None);
            return Err(AuthError::InvalidCredentials);
        }

        let refreshed = session_for(session.user);
        self.set_session(Some(refreshed.clone()));
        self.emit(AuthEvent::TokenRefreshed, Some(refreshed.clone()));
        Ok(Some(refreshed))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        self.check_online()?;

        if self.account.user.email.as_deref() != Some(email) || password != PASSWORD {
            return Err(AuthError::InvalidCredentials);
        }

        self.set_session(Some(self.account.clone()));
        self.emit(AuthEvent::SignedIn, Some(self.account.clone()));
        Ok(self.account.clone())
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        metadata: &UserMetadata,
    ) -> Result<SignUpOutcome, AuthError> {
        self.check_online()?;
        Ok(SignUpOutcome {
            user: identity(email, metadata.clone()),
            session: None,
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if self.sign_out_fails.load(Ordering::SeqCst) {
            return Err(AuthError::Network("connection reset".to_string()));
        }

        self.set_session(None);
        self.emit(AuthEvent::SignedOut, None);
        Ok(())
    }

    async fn reset_password_for_email(&self, _email: &str) -> Result<(), AuthError> {
        self.check_online()
    }

    async fn update_password(&self, _new_password: &str) -> Result<IdentityUser, AuthError> {
        self.check_online()?;
        self.stored_session()
            .map(|session| session.user)
            .ok_or(AuthError::NotAuthenticated)
    }

    async fn clear_local_session(&self) -> Result<(), AuthError> {
        self.cleared.fetch_add(1, Ordering::SeqCst);
        self.set_session(None);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }

    fn event_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Directory backed by a map of `(table, id)` to records
#[derive(Default)]
pub struct FakeDirectory {
    records: Mutex<HashMap<(&'static str, Uuid), ProfileRecord>>,
    delay: Mutex<Option<Duration>>,
    insert_fails: AtomicBool,
    inserted: Mutex<Vec<NewProfile>>,
}

impl FakeDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put(&self, table: RecordTable, id: Uuid, record: ProfileRecord) {
        self.records
            .lock()
            .unwrap()
            .insert((table.table_name(), id), record);
    }

    /// Delay every lookup, to let resolutions overlap
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_inserts(&self) {
        self.insert_fails.store(true, Ordering::SeqCst);
    }

    pub fn inserted(&self) -> Vec<NewProfile> {
        self.inserted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileDirectory for FakeDirectory {
    async fn fetch_record(
        &self,
        table: RecordTable,
        session: &Session,
    ) -> Result<ProfileRecord, AuthError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.records
            .lock()
            .unwrap()
            .get(&(table.table_name(), session.subject()))
            .cloned()
            .ok_or(AuthError::NotFound)
    }

    async fn insert_profile(
        &self,
        profile: &NewProfile,
        _access_token: Option<&str>,
    ) -> Result<(), AuthError> {
        if self.insert_fails.load(Ordering::SeqCst) {
            return Err(AuthError::Provider {
                status: 403,
                message: "new row violates row-level security policy".to_string(),
            });
        }

        self.inserted.lock().unwrap().push(profile.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// App state whose portals all share `provider`
pub fn app_state(provider: Arc<FakeProvider>, directory: Arc<FakeDirectory>) -> AppState {
    let factory = move |_portal_id: &str| -> Arc<dyn IdentityProvider> { provider.clone() };
    let factory: Arc<dyn ProviderFactory> = Arc::new(factory);

    AppState {
        portals: PortalRegistry::new(factory, directory),
        cookie_name: "portal_sid".to_string(),
        loading_wait: Duration::from_secs(2),
        refresh_margin_secs: REFRESH_MARGIN_SECS,
    }
}
