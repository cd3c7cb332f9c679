//! Member portal for the concierge service
//!
//! Resolves who the current member is from the hosted identity provider and
//! guards portal routes by role. Each browser session gets its own portal
//! (see [`portal`]); within it, [`auth::SessionManager`] is the only code
//! that talks to the provider, and [`guard::RouteGuard`] decides what a
//! request may see.

pub mod auth;
pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod guard;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod portal;
pub mod provider;
pub mod resolver;
pub mod routes;
pub mod state;
pub mod storage;
pub mod validation;

pub use auth::SessionManager;
pub use context::{AuthState, SessionContext};
pub use guard::{GuardDecision, RouteGuard};
pub use resolver::resolve_user_from_session;
pub use state::AppState;
