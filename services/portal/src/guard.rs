//! Role-based route guard

use crate::context::AuthState;
use crate::models::{Role, User};

pub const SIGN_IN_PATH: &str = "/signin";
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

/// What a guarded route does for the current state
#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    /// First resolution still pending; show the loading indicator
    Loading,
    RedirectToSignIn,
    RedirectToUnauthorized,
    Render(User),
}

/// Set of roles allowed to view a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    allowed_roles: Vec<Role>,
}

impl RouteGuard {
    pub fn new(allowed_roles: &[Role]) -> Self {
        Self {
            allowed_roles: allowed_roles.to_vec(),
        }
    }

    /// Any signed-in user, whatever the role
    pub fn any_role() -> Self {
        Self::new(&[Role::Member, Role::Partner, Role::Admin])
    }

    pub fn allowed_roles(&self) -> &[Role] {
        &self.allowed_roles
    }

    /// Evaluate against the current state. Nothing is cached between calls.
    pub fn evaluate(&self, state: &AuthState) -> GuardDecision {
        match state {
            AuthState::Loading => GuardDecision::Loading,
            AuthState::Unauthenticated => GuardDecision::RedirectToSignIn,
            AuthState::Authenticated(user) if user.has_role(&self.allowed_roles) => {
                GuardDecision::Render(user.clone())
            }
            AuthState::Authenticated(_) => GuardDecision::RedirectToUnauthorized,
        }
    }
}
