//! HTTP surface tests: guarded routes, sign-in and the session cookie.

mod support;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use chrono::Utc;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use portal::AppState;
use portal::config::ProviderConfig;
use portal::models::{RecordTable, Role, Session, UserMetadata};
use portal::portal::PortalRegistry;
use portal::provider::GoTrueFactory;
use portal::routes::create_router;
use portal::storage::{MemorySessionStorage, SessionStorage};

use support::{
    FakeDirectory, FakeProvider, PASSWORD, REFRESH_MARGIN_SECS, app_state, expiring_session_for,
    identity, record, session_for,
};

const EMAIL: &str = "dana@example.com";

fn test_state(account: Session, role: Option<Role>) -> (AppState, Arc<FakeProvider>) {
    let provider = FakeProvider::new(account);
    let directory = FakeDirectory::new();
    if let Some(role) = role {
        let id = provider.account().subject();
        directory.put(RecordTable::Profiles, id, record(role, Some("Dana Scully")));
    }

    (app_state(provider.clone(), directory), provider)
}

fn test_app(role: Option<Role>) -> (Router, Arc<FakeProvider>, Arc<FakeDirectory>) {
    let provider = FakeProvider::new(session_for(identity(EMAIL, UserMetadata::default())));
    let directory = FakeDirectory::new();
    if let Some(role) = role {
        let id = provider.account().subject();
        directory.put(RecordTable::Profiles, id, record(role, Some("Dana Scully")));
    }

    let app = create_router(app_state(provider.clone(), directory.clone()));
    (app, provider, directory)
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// `name=value` pair of the session cookie set on `resp`
fn session_cookie(resp: &Response<Body>) -> String {
    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

fn location(resp: &Response<Body>) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

async fn json_body(resp: Response<Body>) -> Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Sign in and return the session cookie
async fn sign_in(app: &Router) -> String {
    let req = post_json(
        "/auth/signin",
        None,
        json!({ "email": EMAIL, "password": PASSWORD }),
    );
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    session_cookie(&resp)
}

#[tokio::test]
async fn test_health_check() {
    let (app, _provider, _directory) = test_app(None);

    let resp = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_guarded_route_redirects_to_sign_in() {
    let account = session_for(identity(EMAIL, UserMetadata::default()));
    let (state, _provider) = test_state(account, Some(Role::Admin));
    let app = create_router(state.clone());

    let resp = app.oneshot(get("/portal/dashboard", None)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/signin");
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    assert!(state.portals.is_empty().await);
}

#[tokio::test]
async fn test_anonymous_requests_open_no_portals() {
    let account = session_for(identity(EMAIL, UserMetadata::default()));
    let (state, _provider) = test_state(account, Some(Role::Admin));
    let app = create_router(state.clone());

    let unknown = format!("portal_sid={}", Uuid::new_v4());
    let cookies = [None, Some("portal_sid=not-a-uuid"), Some(unknown.as_str())];

    for _ in 0..50 {
        for cookie in cookies {
            for uri in ["/portal/dashboard", "/portal/admin"] {
                let resp = app.clone().oneshot(get(uri, cookie)).await.unwrap();
                assert_eq!(location(&resp), "/signin", "{} with {:?}", uri, cookie);
            }
            let resp = app.clone().oneshot(get("/auth/session", cookie)).await.unwrap();
            assert_eq!(json_body(resp).await["status"], "unauthenticated");
        }
    }

    assert_eq!(state.portals.len().await, 0);
}

#[tokio::test]
async fn test_session_info_without_portal_is_unauthenticated() {
    let (app, _provider, _directory) = test_app(None);

    let resp = app.oneshot(get("/auth/session", None)).await.unwrap();
    let body = json_body(resp).await;

    assert_eq!(body["status"], "unauthenticated");
    assert!(body["user"].is_null());
}

#[tokio::test]
async fn test_signed_in_member_sees_dashboard() {
    let (app, _provider, _directory) = test_app(Some(Role::Member));
    let cookie = sign_in(&app).await;

    let resp = app
        .oneshot(get("/portal/dashboard", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["user"]["role"], "member");
    assert_eq!(body["user"]["full_name"], "Dana Scully");
}

#[tokio::test]
async fn test_member_is_sent_to_unauthorized_from_admin_area() {
    let (app, _provider, _directory) = test_app(Some(Role::Member));
    let cookie = sign_in(&app).await;

    let resp = app
        .oneshot(get("/portal/admin", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/unauthorized");
}

#[tokio::test]
async fn test_partner_area_allows_partner_and_admin() {
    for role in [Role::Partner, Role::Admin] {
        let (app, _provider, _directory) = test_app(Some(role));
        let cookie = sign_in(&app).await;

        let resp = app
            .oneshot(get("/portal/partner", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "role {}", role);
    }
}

#[tokio::test]
async fn test_wrong_password_returns_credentials_failure() {
    let (app, _provider, _directory) = test_app(Some(Role::Member));

    let req = post_json(
        "/auth/signin",
        None,
        json!({ "email": EMAIL, "password": "wrong password" }),
    );
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body = json_body(resp).await;
    assert_eq!(body["error"]["isCredentialsError"], true);
    assert_eq!(body["error"]["isNetworkError"], false);
}

#[tokio::test]
async fn test_sign_out_revokes_access() {
    let (app, _provider, _directory) = test_app(Some(Role::Admin));
    let cookie = sign_in(&app).await;

    let resp = app
        .clone()
        .oneshot(post_json("/auth/signout", Some(&cookie), json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(get("/portal/admin", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/signin");
}

#[tokio::test]
async fn test_sign_out_without_portal_succeeds() {
    let (app, _provider, _directory) = test_app(Some(Role::Admin));

    let resp = app
        .oneshot(post_json("/auth/signout", None, json!({})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["message"], "Signed out");
}

#[tokio::test]
async fn test_expired_session_with_revoked_refresh_is_sent_to_sign_in() {
    let account = expiring_session_for(identity(EMAIL, UserMetadata::default()), 1);
    let (state, provider) = test_state(account, Some(Role::Admin));
    provider.revoke_refresh_token();
    let app = create_router(state);
    let cookie = sign_in(&app).await;

    let resp = app
        .oneshot(get("/portal/admin", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/signin");
    assert!(provider.refresh_attempts() >= 1);
    assert_eq!(provider.stored_session(), None);
}

#[tokio::test]
async fn test_expiring_session_is_refreshed_before_render() {
    let account = expiring_session_for(identity(EMAIL, UserMetadata::default()), 1);
    let (state, provider) = test_state(account, Some(Role::Admin));
    let app = create_router(state);
    let cookie = sign_in(&app).await;

    let resp = app
        .oneshot(get("/portal/admin", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(provider.refresh_attempts() >= 1);
    assert!(!provider.stored_session().unwrap().expires_within(REFRESH_MARGIN_SECS));
}

#[tokio::test]
async fn test_revoked_refresh_token_ends_access_through_hosted_provider() {
    let mock_server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "token_type": "bearer",
            "expires_in": 1,
            "expires_at": Utc::now().timestamp() + 1,
            "refresh_token": "refresh-1",
            "user": { "id": user_id, "email": EMAIL, "user_metadata": {} }
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid Refresh Token: Refresh Token Revoked"
        })))
        .expect(1..)
        .mount(&mock_server)
        .await;

    let config = ProviderConfig {
        url: mock_server.uri(),
        anon_key: "test-anon-key".to_string(),
        jwt_secret: None,
        reset_redirect_url: None,
        request_timeout_secs: 5,
        refresh_margin_secs: REFRESH_MARGIN_SECS,
        session_ttl_secs: 3600,
    };
    let storage: Arc<dyn SessionStorage> = Arc::new(MemorySessionStorage::new());
    let factory = GoTrueFactory::new(config, storage).unwrap();

    let directory = FakeDirectory::new();
    directory.put(RecordTable::Profiles, user_id, record(Role::Admin, Some("W. Skinner")));

    let app = create_router(AppState {
        portals: PortalRegistry::new(Arc::new(factory), directory),
        cookie_name: "portal_sid".to_string(),
        loading_wait: Duration::from_secs(2),
        refresh_margin_secs: REFRESH_MARGIN_SECS,
    });
    let cookie = sign_in(&app).await;

    let resp = app
        .oneshot(get("/portal/admin", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/signin");
}

#[tokio::test]
async fn test_session_info_reports_signed_in_user() {
    let (app, _provider, _directory) = test_app(Some(Role::Partner));
    let cookie = sign_in(&app).await;

    let resp = app
        .oneshot(get("/auth/session", Some(&cookie)))
        .await
        .unwrap();
    let body = json_body(resp).await;

    assert_eq!(body["status"], "authenticated");
    assert_eq!(body["user"]["role"], "partner");
}

#[tokio::test]
async fn test_slow_resolution_shows_loading_page() {
    let (_app, provider, directory) = test_app(Some(Role::Member));
    provider.set_session(Some(provider.account().clone()));
    directory.set_delay(Duration::from_millis(500));

    let mut state = app_state(provider, directory);
    state.loading_wait = Duration::from_millis(20);
    let app = create_router(state.clone());

    // The cookie names a browser session whose provider session is still persisted.
    let cookie = format!("portal_sid={}", Uuid::new_v4());
    let resp = app
        .oneshot(get("/portal/dashboard", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("refresh").unwrap(), "1");
    assert_eq!(state.portals.len().await, 1);
}

#[tokio::test]
async fn test_sign_up_rejects_invalid_email() {
    let (app, _provider, _directory) = test_app(None);

    let req = post_json(
        "/auth/signup",
        None,
        json!({ "email": "not-an-email", "password": "secret1", "full_name": "New" }),
    );
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_password_requires_valid_password() {
    let (app, _provider, _directory) = test_app(Some(Role::Member));
    let cookie = sign_in(&app).await;

    let resp = app
        .clone()
        .oneshot(post_json(
            "/auth/update-password",
            Some(&cookie),
            json!({ "password": "abc" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .oneshot(post_json(
            "/auth/update-password",
            Some(&cookie),
            json!({ "password": "a much longer secret" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_registry_reuses_and_evicts_portals() {
    let provider = FakeProvider::new(session_for(identity(EMAIL, UserMetadata::default())));
    let state = app_state(provider, FakeDirectory::new());

    let first = state.portals.get_or_open(None).await;
    let again = state.portals.get_or_open(Some(first.id())).await;
    assert!(Arc::ptr_eq(&first, &again));

    let other = state.portals.get_or_open(Some("not-a-uuid")).await;
    assert_ne!(other.id(), "not-a-uuid");
    assert_eq!(state.portals.len().await, 2);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(state.portals.evict_idle(Duration::from_millis(1)).await, 2);
    assert!(state.portals.is_empty().await);
}

#[tokio::test]
async fn test_registry_find_restores_only_persisted_sessions() {
    let provider = FakeProvider::new(session_for(identity(EMAIL, UserMetadata::default())));
    let state = app_state(provider.clone(), FakeDirectory::new());
    let id = Uuid::new_v4().to_string();

    assert!(state.portals.find(None).await.is_none());
    assert!(state.portals.find(Some("not-a-uuid")).await.is_none());
    assert!(state.portals.find(Some(id.as_str())).await.is_none());
    assert!(state.portals.is_empty().await);

    provider.set_session(Some(provider.account().clone()));
    let restored = state.portals.find(Some(id.as_str())).await.unwrap();
    assert_eq!(restored.id(), id);

    let again = state.portals.find(Some(id.as_str())).await.unwrap();
    assert!(Arc::ptr_eq(&restored, &again));
    assert_eq!(state.portals.len().await, 1);
}
