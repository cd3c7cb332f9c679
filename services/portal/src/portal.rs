//! Per-browser-session portals
//!
//! Each browser session gets its own portal: a provider client, a session
//! context, a manager, and the listener following provider events. Portals
//! are keyed by the id carried in the session cookie. Only signing in or
//! signing up opens one; other requests can at most restore a portal whose
//! provider session is still persisted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::SessionManager;
use crate::context::SessionContext;
use crate::directory::ProfileDirectory;
use crate::provider::{IdentityProvider, ProviderFactory};

/// One browser session's view of the identity provider
pub struct Portal {
    id: String,
    manager: SessionManager,
    listener: JoinHandle<()>,
    last_seen: Mutex<Instant>,
}

impl Portal {
    /// Open a portal and start its first session resolution in the background
    fn open(
        id: String,
        provider: Arc<dyn IdentityProvider>,
        directory: Arc<dyn ProfileDirectory>,
    ) -> Self {
        let manager = SessionManager::new(provider, directory, SessionContext::new());
        let listener = manager.spawn_listener();

        let initial = manager.clone();
        tokio::spawn(async move { initial.refresh_session().await });

        Self {
            id,
            manager,
            listener,
            last_seen: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    fn touch(&self) {
        if let Ok(mut last_seen) = self.last_seen.lock() {
            *last_seen = Instant::now();
        }
    }

    fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .map(|last_seen| last_seen.elapsed())
            .unwrap_or_default()
    }
}

impl Drop for Portal {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Registry of open portals
#[derive(Clone)]
pub struct PortalRegistry {
    portals: Arc<RwLock<HashMap<String, Arc<Portal>>>>,
    factory: Arc<dyn ProviderFactory>,
    directory: Arc<dyn ProfileDirectory>,
}

impl PortalRegistry {
    pub fn new(factory: Arc<dyn ProviderFactory>, directory: Arc<dyn ProfileDirectory>) -> Self {
        Self {
            portals: Arc::new(RwLock::new(HashMap::new())),
            factory,
            directory,
        }
    }

    /// Return the portal for `requested`, opening one when needed.
    ///
    /// A well-formed id whose portal was evicted is reopened under the same
    /// id so a persisted provider session is picked up again. Anything that
    /// is not a UUID gets a fresh id. Reserved for sign-in and sign-up.
    pub async fn get_or_open(&self, requested: Option<&str>) -> Arc<Portal> {
        let requested = requested.and_then(|id| Uuid::parse_str(id).ok());

        if let Some(id) = requested {
            if let Some(portal) = self.portals.read().await.get(&id.to_string()) {
                portal.touch();
                return portal.clone();
            }
        }

        let id = requested.unwrap_or_else(Uuid::new_v4).to_string();
        let mut portals = self.portals.write().await;

        // Another request for the same browser session may have won the race.
        if let Some(portal) = portals.get(&id) {
            portal.touch();
            return portal.clone();
        }

        debug!("Opening portal {}", id);
        let provider = self.factory.create(&id);
        let portal = Arc::new(Portal::open(id.clone(), provider, self.directory.clone()));
        portals.insert(id, portal.clone());
        portal
    }

    /// Return the portal named by `requested` without starting a new
    /// browser session.
    ///
    /// An evicted portal is reopened only when the provider still holds a
    /// persisted session for its id. Missing, malformed, or unknown ids
    /// yield `None` and leave the registry untouched.
    pub async fn find(&self, requested: Option<&str>) -> Option<Arc<Portal>> {
        let id = requested.and_then(|id| Uuid::parse_str(id).ok())?.to_string();

        if let Some(portal) = self.portals.read().await.get(&id) {
            portal.touch();
            return Some(portal.clone());
        }

        let provider = self.factory.create(&id);
        match provider.get_session().await {
            Ok(Some(_)) => {}
            Ok(None) => return None,
            Err(e) => {
                debug!("Portal {} not restored: {}", id, e);
                return None;
            }
        }

        let mut portals = self.portals.write().await;
        let portal = portals
            .entry(id.clone())
            .or_insert_with(|| {
                debug!("Restoring portal {}", id);
                Arc::new(Portal::open(id.clone(), provider, self.directory.clone()))
            })
            .clone();
        portal.touch();
        Some(portal)
    }

    /// Manager for a one-off provider call made outside any browser session
    pub fn detached_manager(&self) -> SessionManager {
        let provider = self.factory.create(&Uuid::new_v4().to_string());
        SessionManager::new(provider, self.directory.clone(), SessionContext::new())
    }

    /// Drop portals idle for longer than `max_idle`; returns how many
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut portals = self.portals.write().await;
        let before = portals.len();
        portals.retain(|_, portal| portal.idle_for() < max_idle);
        before - portals.len()
    }

    pub async fn len(&self) -> usize {
        self.portals.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Periodically evict idle portals
    pub fn spawn_sweeper(&self, max_idle: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        let period = (max_idle / 2).max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let evicted = registry.evict_idle(max_idle).await;
                if evicted > 0 {
                    info!("Evicted {} idle portals", evicted);
                }
            }
        })
    }
}
