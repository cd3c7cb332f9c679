//! Portal routes

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use crate::context::AuthState;
use crate::error::{PortalError, PortalResult};
use crate::guard::RouteGuard;
use crate::middleware::{CurrentUser, GuardState, require_roles};
use crate::models::Role;
use crate::portal::Portal;
use crate::state::AppState;

/// Request for password sign-in
#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Request for account creation
#[derive(Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

/// Request for a password reset email
#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
}

/// Request for a password change
#[derive(Deserialize)]
pub struct UpdatePasswordRequest {
    pub password: String,
}

/// Create the router for the portal service
pub fn create_router(state: AppState) -> Router {
    let signed_in = Router::new()
        .route("/portal/dashboard", get(dashboard))
        .route("/auth/update-password", post(update_password))
        .route_layer(from_fn_with_state(
            GuardState {
                app: state.clone(),
                guard: RouteGuard::any_role(),
            },
            require_roles,
        ));

    let partners = Router::new()
        .route("/portal/partner", get(partner_area))
        .route_layer(from_fn_with_state(
            GuardState {
                app: state.clone(),
                guard: RouteGuard::new(&[Role::Partner, Role::Admin]),
            },
            require_roles,
        ));

    let admins = Router::new()
        .route("/portal/admin", get(admin_area))
        .route_layer(from_fn_with_state(
            GuardState {
                app: state.clone(),
                guard: RouteGuard::new(&[Role::Admin]),
            },
            require_roles,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/signin", get(sign_in_page))
        .route("/unauthorized", get(unauthorized_page))
        .route("/auth/session", get(session_info))
        .route("/auth/signin", post(sign_in))
        .route("/auth/signup", post(sign_up))
        .route("/auth/signout", post(sign_out))
        .route("/auth/reset-password", post(reset_password))
        .merge(signed_in)
        .merge(partners)
        .merge(admins)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "portal",
        "open_portals": state.portals.len().await,
    }))
}

pub async fn sign_in_page() -> impl IntoResponse {
    Json(json!({
        "page": "signin",
        "message": "Please sign in to continue.",
    }))
}

pub async fn unauthorized_page() -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "page": "unauthorized",
            "message": "Your account does not have access to this page.",
        })),
    )
}

/// Current user and pending notices
pub async fn session_info(State(state): State<AppState>, jar: CookieJar) -> Json<Value> {
    let Some(portal) = state.find_portal(&jar).await else {
        return Json(json!({
            "status": "unauthenticated",
            "user": null,
            "notices": [],
        }));
    };

    let manager = portal.manager();
    let mut auth_state = manager.context().wait_resolved(state.loading_wait).await;
    if auth_state != AuthState::Loading {
        auth_state = manager.revalidate(state.refresh_margin_secs).await;
    }

    let status = match &auth_state {
        AuthState::Loading => "loading",
        AuthState::Authenticated(_) => "authenticated",
        AuthState::Unauthenticated => "unauthenticated",
    };

    Json(json!({
        "status": status,
        "user": auth_state.user(),
        "notices": manager.context().take_notices(),
    }))
}

/// Password sign-in endpoint
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SignInRequest>,
) -> (CookieJar, PortalResult<Json<Value>>) {
    let (jar, portal) = state.open_portal(jar).await;

    let result = portal
        .manager()
        .sign_in(payload.email.trim(), &payload.password)
        .await
        .map(|user| Json(json!({ "user": user })))
        .map_err(PortalError::SignIn);

    (jar, result)
}

/// Account creation endpoint
pub async fn sign_up(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SignUpRequest>,
) -> (CookieJar, PortalResult<impl IntoResponse>) {
    let (jar, portal) = state.open_portal(jar).await;

    let result = portal
        .manager()
        .sign_up(payload.email.trim(), &payload.password, &payload.full_name)
        .await
        .map(|()| {
            (
                StatusCode::CREATED,
                Json(json!({
                    "message": "Account created. Check your email to confirm it.",
                    "notices": portal.manager().context().take_notices(),
                })),
            )
        })
        .map_err(PortalError::from);

    (jar, result)
}

/// Sign-out endpoint; always succeeds
pub async fn sign_out(State(state): State<AppState>, jar: CookieJar) -> Json<Value> {
    let notices = match state.find_portal(&jar).await {
        Some(portal) => {
            portal.manager().sign_out().await;
            portal.manager().context().take_notices()
        }
        None => Vec::new(),
    };

    Json(json!({
        "message": "Signed out",
        "notices": notices,
    }))
}

/// Password reset email endpoint
pub async fn reset_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<ResetPasswordRequest>,
) -> PortalResult<Json<Value>> {
    let manager = match state.find_portal(&jar).await {
        Some(portal) => portal.manager().clone(),
        None => state.portals.detached_manager(),
    };

    manager.reset_password(payload.email.trim()).await?;

    Ok(Json(json!({
        "message": "If an account exists for this email, a reset link is on its way.",
    })))
}

/// Password change endpoint; requires a signed-in user
pub async fn update_password(
    Extension(portal): Extension<Arc<Portal>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<UpdatePasswordRequest>,
) -> PortalResult<Json<Value>> {
    info!("Password change for user: {}", user.id);
    portal.manager().update_password(&payload.password).await?;

    Ok(Json(json!({ "message": "Password updated" })))
}

pub async fn dashboard(Extension(CurrentUser(user)): Extension<CurrentUser>) -> impl IntoResponse {
    Json(json!({ "page": "dashboard", "user": user }))
}

pub async fn partner_area(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> impl IntoResponse {
    Json(json!({ "page": "partner", "user": user }))
}

pub async fn admin_area(Extension(CurrentUser(user)): Extension<CurrentUser>) -> impl IntoResponse {
    Json(json!({ "page": "admin", "user": user }))
}
