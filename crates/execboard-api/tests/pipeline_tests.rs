//! Request pipeline tests: rate limit, session and role gate, validation,
//! CSRF and the error envelope.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::{empty_request, json_request, TestApp};
use execboard_api::{create_router, ApiConfig, AppState};
use execboard_db::{DbError, DbResult, Repositories, StoreHealth};
use execboard_kv::{KvError, KvResult, KvStore, MemoryKvStore, RatePolicy};
use execboard_models::{JobFilter, PageRequest};

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn test_auth_rate_limit_rejects_after_limit() {
    let mut config = ApiConfig::default();
    config.rate_limits.auth = RatePolicy::new("auth", 3, 60);
    let app = TestApp::with_config(config);
    let body = json!({ "email": "nobody@example.com", "password": "wrong-password" });

    for _ in 0..3 {
        let (status, _) = app
            .send(json_request(Method::POST, "/api/auth/login", None, body.clone()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let response = app
        .router()
        .oneshot(json_request(Method::POST, "/api/auth/login", None, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "60");
    assert_eq!(response.headers()["x-ratelimit-limit"], "3");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
}

#[tokio::test]
async fn test_rate_limit_is_counted_per_client() {
    let mut config = ApiConfig::default();
    config.rate_limits.auth = RatePolicy::new("auth", 1, 60);
    let app = TestApp::with_config(config);
    let body = json!({ "email": "nobody@example.com", "password": "wrong-password" });

    let request_from = |ip: &str| {
        let mut request = json_request(Method::POST, "/api/auth/login", None, body.clone());
        request
            .headers_mut()
            .insert("x-forwarded-for", ip.parse().unwrap());
        request
    };

    let (status, _) = app.send(request_from("203.0.113.1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.send(request_from("203.0.113.1")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let (status, _) = app.send(request_from("203.0.113.2")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Session and role gate
// ============================================================================

#[tokio::test]
async fn test_missing_session_is_401() {
    let app = TestApp::new();

    let (status, body) = app
        .send(empty_request(Method::GET, "/api/candidates/me", None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_tampered_token_is_401() {
    let app = TestApp::new();
    let candidate = app.candidate("casey@example.com").await;
    let token = format!("{}x", candidate.token);

    let (status, _) = app
        .send(empty_request(Method::GET, "/api/candidates/me", Some(&token)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_role_is_403_and_creates_nothing() {
    let app = TestApp::new();
    let candidate = app.candidate("casey@example.com").await;

    let (status, _) = app
        .send(json_request(
            Method::POST,
            "/api/jobs",
            Some(&candidate.token),
            json!({
                "title": "Chief Nursing Officer",
                "description": "Lead nursing strategy.",
                "location": "Denver, CO"
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let page = app
        .state
        .repos
        .jobs
        .list_public(&JobFilter::default(), PageRequest::default(), chrono::Utc::now())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_role_is_checked_before_body_validation() {
    let app = TestApp::new();
    let candidate = app.candidate("casey@example.com").await;

    // Empty title would be a 400 for an employer
    let (status, _) = app
        .send(json_request(
            Method::POST,
            "/api/jobs",
            Some(&candidate.token),
            json!({ "title": "", "description": "", "location": "" }),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_routes_reject_employers() {
    let app = TestApp::new();
    let employer = app.employer("erin@mercy.org").await;

    let (status, _) = app
        .send(empty_request(Method::GET, "/api/admin/stats", Some(&employer.token)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_suspended_account_is_rejected() {
    let app = TestApp::new();
    let candidate = app.candidate("casey@example.com").await;
    app.state
        .repos
        .users
        .set_status(candidate.user.id, execboard_models::AccountStatus::Suspended)
        .await
        .unwrap();

    let (status, body) = app
        .send(empty_request(Method::GET, "/api/candidates/me", Some(&candidate.token)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Account suspended");
}

// ============================================================================
// Validation and envelope
// ============================================================================

#[tokio::test]
async fn test_malformed_json_is_400_with_envelope() {
    let app = TestApp::new();
    let employer = app.employer("erin@mercy.org").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/jobs")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", employer.token))
        .body(Body::from("{\"title\": "))
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_field_errors_are_listed() {
    let app = TestApp::new();
    let employer = app.employer("erin@mercy.org").await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/jobs",
            Some(&employer.token),
            json!({ "title": "", "description": "Lead clinical teams.", "location": "Austin, TX" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["title"].is_array());
}

#[tokio::test]
async fn test_successful_response_envelope() {
    let app = TestApp::new();
    let candidate = app.candidate("casey@example.com").await;

    let (status, body) = app
        .send(empty_request(Method::GET, "/api/auth/session", Some(&candidate.token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["email"], "casey@example.com");
}

#[tokio::test]
async fn test_unknown_route_is_404_envelope() {
    let app = TestApp::new();

    let (status, body) = app
        .send(empty_request(Method::GET, "/api/does-not-exist", None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Route not found");
}

#[tokio::test]
async fn test_wrong_method_is_405_envelope() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(empty_request(Method::PUT, "/api/jobs", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(response.headers().contains_key(header::ALLOW));

    let (status, body) = app.send(empty_request(Method::PUT, "/api/jobs", None)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "Method not allowed");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_oversized_body_is_413_envelope() {
    let mut config = ApiConfig::default();
    config.max_body_size = 64;
    let app = TestApp::with_config(config);
    let employer = app.employer("erin@mercy.org").await;
    let payload = json!({ "title": "x".repeat(256) }).to_string();

    // Declared length over the limit
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/jobs")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, payload.len())
        .header(header::AUTHORIZATION, format!("Bearer {}", employer.token))
        .body(Body::from(payload.clone()))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "Request body too large");
    assert!(body["timestamp"].is_string());

    // No declared length; the limit trips while reading
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/jobs")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", employer.token))
        .body(Body::from(payload))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "Request body too large");
}

#[tokio::test]
async fn test_ai_without_model_is_503() {
    let app = TestApp::new();
    let candidate = app.candidate("casey@example.com").await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/ai/resume-analysis",
            Some(&candidate.token),
            json!({ "resume_text": "Twelve years leading hospital operations." }),
        ))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "AI features are not configured");
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();

    let (status, _) = app.send(empty_request(Method::GET, "/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(empty_request(Method::GET, "/ready", None)).await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// CSRF
// ============================================================================

fn cookie_request(method: Method, uri: &str, token: &str, csrf: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, format!("execboard_session={token}"));
    if let Some(csrf) = csrf {
        builder = builder.header("x-csrf-token", csrf);
    }
    builder.body(Body::from("{}")).unwrap()
}

#[tokio::test]
async fn test_cookie_write_requires_csrf_token() {
    let app = TestApp::new();
    let candidate = app.candidate("casey@example.com").await;

    let (status, body) = app
        .send(cookie_request(
            Method::POST,
            "/api/notifications/read-all",
            &candidate.token,
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Missing CSRF token");

    let (status, _) = app
        .send(cookie_request(
            Method::POST,
            "/api/notifications/read-all",
            &candidate.token,
            Some("0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef"),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cookie_write_with_issued_csrf_token_passes() {
    let app = TestApp::new();
    let candidate = app.candidate("casey@example.com").await;

    let (status, body) = app.send(empty_request(Method::GET, "/api/csrf", None)).await;
    assert_eq!(status, StatusCode::OK);
    let csrf = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(cookie_request(
            Method::POST,
            "/api/notifications/read-all",
            &candidate.token,
            Some(&csrf),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["updated"], 0);
}

#[tokio::test]
async fn test_bearer_writes_skip_csrf() {
    let app = TestApp::new();
    let candidate = app.candidate("casey@example.com").await;

    let (status, _) = app
        .send(json_request(
            Method::POST,
            "/api/notifications/read-all",
            Some(&candidate.token),
            json!({}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Readiness
// ============================================================================

struct UnreachableKv;

#[async_trait]
impl KvStore for UnreachableKv {
    async fn incr(&self, _key: &str) -> KvResult<i64> {
        Err(KvError::connection_failed("connection refused"))
    }
    async fn expire(&self, _key: &str, _ttl: Duration) -> KvResult<()> {
        Err(KvError::connection_failed("connection refused"))
    }
    async fn ttl(&self, _key: &str) -> KvResult<Option<Duration>> {
        Err(KvError::connection_failed("connection refused"))
    }
    async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> KvResult<()> {
        Err(KvError::connection_failed("connection refused"))
    }
    async fn get(&self, _key: &str) -> KvResult<Option<String>> {
        Err(KvError::connection_failed("connection refused"))
    }
    async fn delete(&self, _key: &str) -> KvResult<bool> {
        Err(KvError::connection_failed("connection refused"))
    }
    async fn ping(&self) -> KvResult<()> {
        Err(KvError::connection_failed("connection refused"))
    }
}

struct UnreachableDatabase;

#[async_trait]
impl StoreHealth for UnreachableDatabase {
    async fn ping(&self) -> DbResult<()> {
        Err(DbError::Unavailable("pool timed out".to_string()))
    }
}

async fn readiness(state: AppState) -> (StatusCode, serde_json::Value) {
    let response = create_router(state, None)
        .oneshot(empty_request(Method::GET, "/ready", None))
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_ready_reports_each_dependency() {
    let app = TestApp::new();

    let (status, body) = app.send(empty_request(Method::GET, "/ready", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["database"]["status"], "ok");
    assert_eq!(body["storage"]["status"], "ok");
    assert_eq!(body["ai"]["status"], "disabled");
    assert_eq!(body["payments"]["status"], "configured");
}

#[tokio::test]
async fn test_ready_is_degraded_without_kv() {
    let state = AppState::new(
        ApiConfig::default(),
        Repositories::in_memory(),
        Arc::new(UnreachableKv),
    );

    let (status, body) = readiness(state).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["kv"]["status"], "error");
    assert_eq!(body["kv"]["error"], "Connection failed: connection refused");
    assert_eq!(body["database"]["status"], "ok");
}

#[tokio::test]
async fn test_ready_is_503_without_database() {
    let mut repos = Repositories::in_memory();
    repos.health = Arc::new(UnreachableDatabase);
    let state = AppState::new(ApiConfig::default(), repos, Arc::new(MemoryKvStore::default()));

    let (status, body) = readiness(state).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");
    assert_eq!(body["database"]["status"], "error");
}
