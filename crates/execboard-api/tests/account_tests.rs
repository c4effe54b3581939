//! Registration, login and account administration over HTTP.

mod common;

use axum::http::{header, Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::{empty_request, json_request, TestApp, PASSWORD};
use execboard_models::AccountStatus;

// ============================================================================
// Registration and login
// ============================================================================

#[tokio::test]
async fn test_register_login_and_session() {
    let app = TestApp::new();

    let register = json_request(
        Method::POST,
        "/api/auth/register",
        None,
        json!({
            "email": "casey@example.com",
            "password": PASSWORD,
            "name": "Casey Morgan",
            "role": "CANDIDATE"
        }),
    );
    let response = app.router().oneshot(register).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with("execboard_session="));
    assert!(cookie.contains("HttpOnly"));

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({ "email": "casey@example.com", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["data"]["candidate_id"].is_string());
    assert!(body["data"]["user"].get("password_hash").is_none());
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(empty_request(Method::GET, "/api/auth/session", Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "casey@example.com");
    assert_eq!(body["data"]["role"], "CANDIDATE");
}

#[tokio::test]
async fn test_register_rejects_admin_and_duplicates() {
    let app = TestApp::new();
    let account = |role: &str| {
        json!({
            "email": "dana@example.com",
            "password": PASSWORD,
            "name": "Dana Reyes",
            "role": role
        })
    };

    let (status, body) = app
        .send(json_request(Method::POST, "/api/auth/register", None, account("ADMIN")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["role"].is_array());

    let (status, _) = app
        .send(json_request(Method::POST, "/api/auth/register", None, account("CANDIDATE")))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .send(json_request(Method::POST, "/api/auth/register", None, account("CANDIDATE")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "An account with this email already exists");
}

#[tokio::test]
async fn test_employer_registration_requires_company() {
    let app = TestApp::new();

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/auth/register",
            None,
            json!({
                "email": "hr@mercy.org",
                "password": PASSWORD,
                "name": "Pat Lee",
                "role": "EMPLOYER"
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["company_name"].is_array());
}

#[tokio::test]
async fn test_wrong_password_is_401() {
    let app = TestApp::new();
    app.candidate("casey@example.com").await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({ "email": "casey@example.com", "password": "not-the-password" }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid email or password");
}

#[tokio::test]
async fn test_suspended_login_is_403() {
    let app = TestApp::new();
    let candidate = app.candidate("casey@example.com").await;
    app.state
        .repos
        .users
        .set_status(candidate.user.id, AccountStatus::Suspended)
        .await
        .unwrap();

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({ "email": "casey@example.com", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Account suspended");
    assert!(body.get("data").is_none());
}

// ============================================================================
// Account administration
// ============================================================================

#[tokio::test]
async fn test_admin_cannot_change_own_status() {
    let app = TestApp::new();
    let admin = app.admin("alex@execboard.test").await;

    let (status, body) = app
        .send(json_request(
            Method::PATCH,
            &format!("/api/admin/users/{}/status", admin.user.id),
            Some(&admin.token),
            json!({ "status": "SUSPENDED" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "You cannot change your own account status");

    let user = app
        .state
        .repos
        .users
        .find_by_id(admin.user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.status, AccountStatus::Active);
}

#[tokio::test]
async fn test_admin_suspends_candidate() {
    let app = TestApp::new();
    let admin = app.admin("alex@execboard.test").await;
    let candidate = app.candidate("casey@example.com").await;

    let (status, body) = app
        .send(json_request(
            Method::PATCH,
            &format!("/api/admin/users/{}/status", candidate.user.id),
            Some(&admin.token),
            json!({ "status": "SUSPENDED" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "SUSPENDED");
    assert_eq!(app.notification_count(candidate.user.id).await, 1);

    // Existing tokens stop working
    let (status, _) = app
        .send(empty_request(Method::GET, "/api/auth/session", Some(&candidate.token)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
