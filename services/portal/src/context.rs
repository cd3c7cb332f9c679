//! Shared session context
//!
//! Holds the resolved user for one portal instance. Every resolution is
//! published under a [`Stamp`]: the provider event sequence it reflects,
//! then a ticket drawn before its first await. An update is applied only
//! when its stamp is newer than the last applied one, so neither a slow
//! resolution that started earlier nor a provider event queued behind a
//! later sign-out can overwrite a newer result.

use serde::Serialize;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};
use chrono::Utc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use crate::models::User;

/// Authentication state as seen by route guards
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// No resolution has completed yet
    Loading,
    Authenticated(User),
    Unauthenticated,
}

impl AuthState {
    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Flash message surfaced to the member on the next page load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Position of a resolution: provider event sequence first, ticket second
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Stamp {
    pub epoch: u64,
    pub ticket: u64,
}

/// Resolved user together with the expiry of the session it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub user: User,
    pub expires_at: i64,
}

#[derive(Debug)]
struct Snapshot {
    state: AuthState,
    expires_at: Option<i64>,
    applied: Stamp,
}

/// Injectable holder of the resolved user
#[derive(Clone)]
pub struct SessionContext {
    state: Arc<watch::Sender<Snapshot>>,
    tickets: Arc<AtomicU64>,
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl SessionContext {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Snapshot {
            state: AuthState::Loading,
            expires_at: None,
            applied: Stamp::default(),
        });

        Self {
            state: Arc::new(tx),
            tickets: Arc::new(AtomicU64::new(0)),
            notices: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Draw the sequence number for a resolution about to start
    pub fn ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Apply the outcome of the resolution stamped `stamp`.
    ///
    /// Returns false when a newer resolution already landed.
    pub fn apply(&self, stamp: Stamp, resolved: Option<Resolved>) -> bool {
        self.state.send_if_modified(|snapshot| {
            if stamp <= snapshot.applied {
                debug!(
                    "Discarding stale resolution {:?} (last applied {:?})",
                    stamp, snapshot.applied
                );
                return false;
            }

            snapshot.applied = stamp;
            match resolved {
                Some(resolved) => {
                    snapshot.state = AuthState::Authenticated(resolved.user);
                    snapshot.expires_at = Some(resolved.expires_at);
                }
                None => {
                    snapshot.state = AuthState::Unauthenticated;
                    snapshot.expires_at = None;
                }
            }
            true
        })
    }

    /// Whether the signed-in user's session expires within `margin_secs`
    pub fn expires_within(&self, margin_secs: i64) -> bool {
        self.state
            .borrow()
            .expires_at
            .is_some_and(|expires_at| expires_at - margin_secs <= Utc::now().timestamp())
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().state.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state().user().cloned()
    }

    /// Wait up to `timeout` for the first resolution to land
    pub async fn wait_resolved(&self, timeout: Duration) -> AuthState {
        let mut rx = self.state.subscribe();
        let resolved = tokio::time::timeout(
            timeout,
            rx.wait_for(|snapshot| snapshot.state != AuthState::Loading),
        )
        .await;

        match resolved {
            Ok(Ok(snapshot)) => snapshot.state.clone(),
            _ => self.state(),
        }
    }

    pub fn push_notice(&self, level: NoticeLevel, message: impl Into<String>) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(Notice {
                level,
                message: message.into(),
            });
        }
    }

    /// Drain pending notices
    pub fn take_notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|mut notices| std::mem::take(&mut *notices))
            .unwrap_or_default()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
