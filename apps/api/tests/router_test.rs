use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use ayursutra_api::{create_router, AppState};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

struct TestApp {
    router: Router,
    config: TestConfig,
    _uploads: tempfile::TempDir,
}

impl TestApp {
    fn new() -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let config = TestConfig { uploads_dir: uploads.path().to_path_buf(), ..TestConfig::default() };
        let state = AppState::new(config.to_arc());
        Self { router: create_router(&state), config, _uploads: uploads }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(&self, name: &str, email: &str, role: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": name, "email": email, "password": "abhyanga-2024", "role": role })),
        )
        .await
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/api/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn test_protected_routes_need_a_token() {
    let app = TestApp::new();

    for uri in ["/api/patients", "/api/procedures", "/api/appointments", "/api/sessions", "/api/prescriptions"] {
        let (status, body) = app.send(Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert!(body["error"].is_string());
    }

    let expired = JwtTestUtils::create_expired_token(&TestUser::admin(), &app.config.jwt_secret);
    let (status, _) = app.send(Method::GET, "/api/patients", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = TestApp::new();

    let (status, registered) = app.register("Ravi Kumar", "ravi@example.com", "patient").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(registered["role"], "patient");

    let (status, login) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "RAVI@example.com", "password": "abhyanga-2024" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["userId"], registered["userId"]);

    let token = login["token"].as_str().unwrap().to_string();
    let (status, me) = app.send(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["email"], "ravi@example.com");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ravi@example.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_room_setup_and_availability() {
    let app = TestApp::new();
    let (_, admin) = app.register("Clinic Admin", "admin@example.com", "admin").await;
    let admin_token = admin["token"].as_str().unwrap().to_string();

    let room = json!({
        "name": "Shirodhara-1",
        "room_type": "shirodhara",
        "capacity": 1,
        "slots": [{ "day_of_week": 1, "start_time": "09:00", "end_time": "13:00", "max_concurrent": 1 }]
    });
    let (status, created) = app.send(Method::POST, "/api/admin/rooms", Some(&admin_token), Some(room.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let room_id = created["room"]["id"].as_str().unwrap().to_string();

    // 2026-10-19 is a Monday
    let inside = format!(
        "/api/rooms/{}/availability?start=2026-10-19T09:00:00Z&end=2026-10-19T10:00:00Z",
        room_id
    );
    let (status, decision) = app.send(Method::GET, &inside, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decision["ok"], true);
    assert_eq!(decision["slot"]["start_time"], "09:00");

    let outside = format!(
        "/api/rooms/{}/availability?start=2026-10-19T14:00:00Z&end=2026-10-19T15:00:00Z",
        room_id
    );
    let (_, decision) = app.send(Method::GET, &outside, Some(&admin_token), None).await;
    assert_eq!(decision["ok"], false);
    assert_eq!(decision["reason"], "No slot for requested time");

    // patients cannot manage rooms
    let patient = JwtTestUtils::create_test_token(&TestUser::patient(), &app.config.jwt_secret, None);
    let (status, _) = app.send(Method::POST, "/api/admin/rooms", Some(&patient), Some(room)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_second_admin_cannot_self_register() {
    let app = TestApp::new();

    let (status, _) = app.register("First Admin", "first@example.com", "admin").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.register("Second Admin", "second@example.com", "admin").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
