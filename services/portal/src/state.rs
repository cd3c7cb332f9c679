//! Application state shared across handlers

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use std::time::Duration;

use crate::portal::{Portal, PortalRegistry};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub portals: PortalRegistry,
    pub cookie_name: String,
    pub loading_wait: Duration,
    /// Sessions this close to expiry are re-checked before a guard runs
    pub refresh_margin_secs: i64,
}

impl AppState {
    /// Portal named by the session cookie, if it is live or restorable
    pub async fn find_portal(&self, jar: &CookieJar) -> Option<Arc<Portal>> {
        let requested = jar.get(&self.cookie_name).map(|c| c.value().to_string());
        self.portals.find(requested.as_deref()).await
    }

    /// Find or open the portal named by the session cookie.
    ///
    /// The returned jar carries a fresh cookie whenever a new id was issued.
    pub async fn open_portal(&self, jar: CookieJar) -> (CookieJar, Arc<Portal>) {
        let requested = jar.get(&self.cookie_name).map(|c| c.value().to_string());
        let portal = self.portals.get_or_open(requested.as_deref()).await;

        if requested.as_deref() == Some(portal.id()) {
            return (jar, portal);
        }

        let cookie = Cookie::build((self.cookie_name.clone(), portal.id().to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();

        (jar.add(cookie), portal)
    }
}
