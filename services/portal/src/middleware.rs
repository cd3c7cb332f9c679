//! Route guard middleware

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use crate::context::AuthState;
use crate::guard::{GuardDecision, RouteGuard, SIGN_IN_PATH, UNAUTHORIZED_PATH};
use crate::models::User;
use crate::state::AppState;

/// Guard configuration for one group of routes
#[derive(Clone)]
pub struct GuardState {
    pub app: AppState,
    pub guard: RouteGuard,
}

/// User resolved for the current request, inserted by [`require_roles`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Evaluate the route guard against the caller's portal on every request.
///
/// Requests without a live portal go straight to sign-in; a session close
/// to expiry is re-checked with the provider before the guard runs.
pub async fn require_roles(
    State(state): State<GuardState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(portal) = state.app.find_portal(&jar).await else {
        debug!("No portal on {}, redirecting to sign-in", req.uri().path());
        return Redirect::to(SIGN_IN_PATH).into_response();
    };

    let manager = portal.manager();
    let mut auth_state = manager.context().wait_resolved(state.app.loading_wait).await;
    if auth_state != AuthState::Loading {
        auth_state = manager.revalidate(state.app.refresh_margin_secs).await;
    }

    match state.guard.evaluate(&auth_state) {
        GuardDecision::Loading => loading_page(),
        GuardDecision::RedirectToSignIn => {
            debug!("No user on {}, redirecting to sign-in", req.uri().path());
            Redirect::to(SIGN_IN_PATH).into_response()
        }
        GuardDecision::RedirectToUnauthorized => {
            debug!(
                "Role not allowed on {} (allowed: {:?})",
                req.uri().path(),
                state.guard.allowed_roles()
            );
            Redirect::to(UNAUTHORIZED_PATH).into_response()
        }
        GuardDecision::Render(user) => {
            req.extensions_mut().insert(CurrentUser(user));
            req.extensions_mut().insert(portal);
            next.run(req).await
        }
    }
}

fn loading_page() -> Response {
    (
        [("refresh", "1")],
        Html("<!doctype html><title>Loading</title><p>Loading your portal...</p>"),
    )
        .into_response()
}
