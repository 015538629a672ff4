use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

use adminkit_api::app::{AppServices, build_app};
use adminkit_auth::{
    Hs256JwtValidator, PermissionEditor, SessionContext, SessionState, TokenClaims, TokenKind, TokenPair,
};
use adminkit_client::{ClientConfig, HttpBackend, SessionGrantBackend};
use adminkit_core::{RoleId, UserId};
use adminkit_infra::{InMemoryConsoleStore, seed_demo_data};

const PASSWORD: &str = "Test@1234";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Same router as prod, seeded store, ephemeral port.
        let store = InMemoryConsoleStore::new().with_bcrypt_cost(4);
        seed_demo_data(&store, PASSWORD).expect("seeding failed");
        let services = AppServices::new(Arc::new(store), Hs256JwtValidator::new(jwt_secret));
        let app = build_app(services);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Sign an access token for `sub` with a window in the past.
fn mint_expired_access(jwt_secret: &str, sub: UserId) -> String {
    let now = Utc::now();
    let claims = TokenClaims {
        sub,
        kind: TokenKind::Access,
        jti: Uuid::now_v7(),
        issued_at: now - ChronoDuration::hours(1),
        expires_at: now - ChronoDuration::minutes(30),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn login(client: &reqwest::Client, srv: &TestServer, username: &str) -> TokenPair {
    let res = client
        .post(srv.url("/api/users/login/"))
        .json(&json!({ "username": username, "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK, "login as {username}");
    res.json().await.unwrap()
}

async fn get_json(client: &reqwest::Client, srv: &TestServer, token: &str, path: &str) -> (StatusCode, Value) {
    let res = client.get(srv.url(path)).bearer_auth(token).send().await.unwrap();
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

fn menu_paths(menu: &Value) -> Vec<String> {
    menu.as_array()
        .unwrap()
        .iter()
        .map(|m| m["path"].as_str().unwrap().to_string())
        .collect()
}

fn permissions_of(menu: &Value, path: &str) -> Vec<String> {
    menu.as_array()
        .unwrap()
        .iter()
        .find(|m| m["path"] == path)
        .map(|m| {
            m["permissions"]
                .as_array()
                .unwrap()
                .iter()
                .map(|p| p.as_str().unwrap().to_string())
                .collect()
        })
        .unwrap_or_default()
}

async fn module_id(client: &reqwest::Client, srv: &TestServer, token: &str, path: &str) -> i64 {
    let (_, modules) = get_json(client, srv, token, "/api/modules/").await;
    modules
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["path"] == path)
        .and_then(|m| m["id"].as_i64())
        .unwrap()
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/api/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(srv.url("/api/modules/my-menu/"))
        .bearer_auth("garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_issues_tokens_for_the_profile() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    let pair = login(&client, &srv, "sarah_hr").await;
    let (status, profile) = get_json(&client, &srv, &pair.access, "/api/users/profile/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "sarah_hr");
    assert_eq!(profile["employee_id"], "EMP004");
    assert!(profile.get("password_hash").is_none());

    let res = client
        .post(srv.url("/api/users/login/"))
        .json(&json!({ "username": "sarah_hr", "password": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn menus_are_scoped_to_roles() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    let viewer = login(&client, &srv, "viewer1").await;
    let (_, menu) = get_json(&client, &srv, &viewer.access, "/api/modules/my-menu/").await;
    assert_eq!(menu_paths(&menu), vec!["/dashboard", "/users", "/roles", "/departments"]);
    assert_eq!(permissions_of(&menu, "/users"), vec!["view"]);

    // IT Manager + Sales Manager: union on Dashboard and Users.
    let combo = login(&client, &srv, "manager_combo").await;
    let (_, menu) = get_json(&client, &srv, &combo.access, "/api/modules/my-menu/").await;
    let dashboard = permissions_of(&menu, "/dashboard");
    for codename in ["view", "view_revenue_card", "view_analytics", "view_user_stats", "view_recent_activity"] {
        assert!(dashboard.iter().any(|c| c == codename), "missing {codename}");
    }
    assert!(permissions_of(&menu, "/users").iter().any(|c| c == "delete"));
    assert!(!menu_paths(&menu).iter().any(|p| p == "/departments"));
}

#[tokio::test]
async fn admin_endpoints_are_capability_guarded() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let viewer = login(&client, &srv, "viewer1").await;

    let (status, _) = get_json(&client, &srv, &viewer.access, "/api/roles/").await;
    assert_eq!(status, StatusCode::OK);

    let res = client
        .post(srv.url("/api/roles/"))
        .bearer_auth(&viewer.access)
        .json(&json!({ "name": "Sneaky" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["explanation"]["denial_reason"]["kind"], "missing_permission");

    let (status, body) = get_json(&client, &srv, &viewer.access, "/api/modules/").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["explanation"]["denial_reason"]["kind"], "unknown_module");

    let (status, body) = get_json(&client, &srv, &viewer.access, "/api/authz/explain?path=/roles&permission=edit").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["granted"], false);
    assert_eq!(body["effective_permissions"], json!(["view"]));
}

#[tokio::test]
async fn replacing_grants_replaces_rather_than_merges() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let admin = login(&client, &srv, "superadmin").await;
    let users = module_id(&client, &srv, &admin.access, "/users").await;

    let res = client
        .post(srv.url("/api/roles/"))
        .bearer_auth(&admin.access)
        .json(&json!({ "name": "Auditor", "description": "Reads things" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let role: Value = res.json().await.unwrap();
    let role_id = role["id"].as_i64().unwrap();

    for granted in [json!(["view", "edit", "delete"]), json!(["view", "edit"])] {
        let res = client
            .post(srv.url(&format!("/api/roles/{role_id}/permissions/")))
            .bearer_auth(&admin.access)
            .json(&json!({ "permissions": [{ "module_id": users, "granted": granted }] }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let (_, tree) = get_json(&client, &srv, &admin.access, &format!("/api/roles/{role_id}/permissions/")).await;
    let users_entry = tree
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["module_id"] == users)
        .unwrap();
    assert_eq!(users_entry["granted_permissions"], json!(["edit", "view"]));

    // Undefined codename: the whole payload is rejected.
    let res = client
        .post(srv.url(&format!("/api/roles/{role_id}/permissions/")))
        .bearer_auth(&admin.access)
        .json(&json!({ "permissions": [{ "module_id": users, "granted": ["view", "fly"] }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let (_, tree) = get_json(&client, &srv, &admin.access, &format!("/api/roles/{role_id}/permissions/")).await;
    let users_entry = tree.as_array().unwrap().iter().find(|m| m["module_id"] == users).unwrap();
    assert_eq!(users_entry["granted_permissions"], json!(["edit", "view"]));
}

#[tokio::test]
async fn deleting_a_module_drops_it_from_every_menu() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let admin = login(&client, &srv, "superadmin").await;
    let viewer = login(&client, &srv, "viewer1").await;
    let departments = module_id(&client, &srv, &admin.access, "/departments").await;

    let res = client
        .delete(srv.url(&format!("/api/modules/{departments}/")))
        .bearer_auth(&admin.access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let (_, menu) = get_json(&client, &srv, &viewer.access, "/api/modules/my-menu/").await;
    assert!(!menu_paths(&menu).iter().any(|p| p == "/departments"));

    let (status, _) = get_json(&client, &srv, &admin.access, &format!("/api/modules/{departments}/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn module_with_permissions_round_trip() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let admin = login(&client, &srv, "superadmin").await;

    let res = client
        .post(srv.url("/api/modules/create-with-permissions/"))
        .bearer_auth(&admin.access)
        .json(&json!({
            "name": "Reports",
            "icon": "chart",
            "path": "/reports",
            "order": 6,
            "permissions": [
                { "codename": "view", "label": "Can View" },
                { "codename": "export_pdf", "label": "Export PDF", "category": "action", "order": 20 }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["available_permissions"].as_array().unwrap().len(), 2);

    // Replacing the definition list drops what is not listed.
    let res = client
        .put(srv.url(&format!("/api/modules/{id}/update-with-permissions/")))
        .bearer_auth(&admin.access)
        .json(&json!({ "name": "Reporting", "permissions": [{ "codename": "view", "label": "See" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["name"], "Reporting");
    let codenames: Vec<_> = updated["available_permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["codename"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(codenames, vec!["view"]);

    // Not granted to anyone yet, so not in the admin's menu.
    let (_, menu) = get_json(&client, &srv, &admin.access, "/api/modules/my-menu/").await;
    assert!(!menu_paths(&menu).iter().any(|p| p == "/reports"));
}

#[tokio::test]
async fn logout_revokes_the_refresh_token() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let pair = login(&client, &srv, "tom_sales").await;

    let res = client
        .post(srv.url("/api/users/token/refresh/"))
        .json(&json!({ "refresh": pair.refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // An access token is never accepted as a refresh token.
    let res = client
        .post(srv.url("/api/users/token/refresh/"))
        .json(&json!({ "refresh": pair.access }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(srv.url("/api/users/logout/"))
        .bearer_auth(&pair.access)
        .json(&json!({ "refresh": pair.refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .post(srv.url("/api/users/token/refresh/"))
        .json(&json!({ "refresh": pair.refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn client_session_renews_an_expired_access_token() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let pair = login(&client, &srv, "john_it").await;
    let (_, profile) = get_json(&client, &srv, &pair.access, "/api/users/profile/").await;
    let user_id = UserId::new(profile["id"].as_i64().unwrap());

    let expired = mint_expired_access(jwt_secret, user_id);
    let backend = Arc::new(HttpBackend::new(ClientConfig::new(&srv.base_url)).unwrap());
    let session = SessionContext::new(backend);

    let principal = session
        .restore(TokenPair { access: expired.clone(), refresh: pair.refresh.clone() })
        .await
        .unwrap();
    assert_eq!(principal.profile.username, "john_it");
    assert!(principal.menu.iter().any(|m| m.path == "/modules"));
    assert_eq!(session.state(), SessionState::Authenticated);
    assert_ne!(session.tokens().await.unwrap().access, expired);
}

#[tokio::test]
async fn client_session_expires_when_refresh_is_revoked() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let pair = login(&client, &srv, "lisa_hr").await;
    let (_, profile) = get_json(&client, &srv, &pair.access, "/api/users/profile/").await;
    let user_id = UserId::new(profile["id"].as_i64().unwrap());

    let res = client
        .post(srv.url("/api/users/logout/"))
        .bearer_auth(&pair.access)
        .json(&json!({ "refresh": pair.refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let backend = Arc::new(HttpBackend::new(ClientConfig::new(&srv.base_url)).unwrap());
    let session = SessionContext::new(backend);
    let err = session
        .restore(TokenPair { access: mint_expired_access(jwt_secret, user_id), refresh: pair.refresh })
        .await
        .unwrap_err();
    assert_eq!(err, adminkit_auth::SessionError::SessionExpired);
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert!(session.tokens().await.is_none());
}

#[tokio::test]
async fn permission_editor_saves_through_the_api() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let admin = login(&client, &srv, "superadmin").await;
    let (_, roles) = get_json(&client, &srv, &admin.access, "/api/roles/").await;
    let viewer_role = roles
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "Viewer")
        .and_then(|r| r["id"].as_i64())
        .unwrap();
    let users = module_id(&client, &srv, &admin.access, "/users").await;

    let backend = Arc::new(HttpBackend::new(ClientConfig::new(&srv.base_url)).unwrap());
    let session = Arc::new(SessionContext::new(backend));
    session.login("superadmin", PASSWORD).await.unwrap();

    let grants = Arc::new(SessionGrantBackend::new(session.clone()));
    let mut editor = PermissionEditor::load(grants, RoleId::new(viewer_role)).await.unwrap();
    editor
        .toggle_permission(adminkit_core::ModuleId::new(users), "view_email")
        .unwrap();
    assert!(editor.is_dirty());
    editor.save().await.unwrap();
    assert!(!editor.is_dirty());

    let viewer = login(&client, &srv, "viewer1").await;
    let (_, menu) = get_json(&client, &srv, &viewer.access, "/api/modules/my-menu/").await;
    assert_eq!(permissions_of(&menu, "/users"), vec!["view", "view_email"]);
    // Other modules of the role were sent back unchanged.
    assert_eq!(permissions_of(&menu, "/roles"), vec!["view"]);
}
