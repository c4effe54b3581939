//! Shared fixtures for API integration tests.
//!
//! Every test gets its own in-memory repositories, KV store and object store.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use execboard_api::auth::hash_password;
use execboard_api::services::{StripeClient, StripeConfig};
use execboard_api::{create_router, ApiConfig, AppState};
use execboard_db::{LinkedProfile, Repositories};
use execboard_kv::MemoryKvStore;
use execboard_models::{CandidateProfile, EmployerProfile, Job, JobStatus, Role, User};
use execboard_storage::MemoryObjectStore;

pub const PASSWORD: &str = "correct-horse-battery";
pub const WEBHOOK_SECRET: &str = "whsec_integration_secret";

pub struct TestApp {
    pub state: AppState,
    pub storage: Arc<MemoryObjectStore>,
}

/// Signed-in test account.
pub struct Account {
    pub user: User,
    pub token: String,
    pub candidate_id: Option<Uuid>,
    pub employer_id: Option<Uuid>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(ApiConfig::default())
    }

    pub fn with_config(config: ApiConfig) -> Self {
        Self::build(config, None)
    }

    /// App with Stripe pointed at `base_url`.
    pub fn with_stripe(config: ApiConfig, base_url: &str) -> Self {
        Self::build(config, Some(base_url.to_string()))
    }

    fn build(config: ApiConfig, stripe_base_url: Option<String>) -> Self {
        let storage = Arc::new(MemoryObjectStore::new());
        let mut stripe_config =
            StripeConfig::new("sk_test_integration").with_webhook_secret(WEBHOOK_SECRET);
        if let Some(base_url) = stripe_base_url {
            stripe_config.base_url = base_url;
        }
        let state = AppState::new(
            config,
            Repositories::in_memory(),
            Arc::new(MemoryKvStore::default()),
        )
        .with_storage(storage.clone())
        .with_stripe(StripeClient::new(stripe_config).unwrap());
        Self { state, storage }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone(), None)
    }

    async fn account(&self, email: &str, name: &str, role: Role) -> Account {
        let user = User::new(email, hash_password(PASSWORD).unwrap(), name, role);
        let profile = match role {
            Role::Candidate => LinkedProfile::Candidate(CandidateProfile::new(user.id)),
            Role::Employer => {
                LinkedProfile::Employer(EmployerProfile::new(user.id, "Mercy Health System"))
            }
            Role::Admin => LinkedProfile::None,
        };
        self.state.repos.users.create(&user, &profile).await.unwrap();

        let (candidate_id, employer_id) = match &profile {
            LinkedProfile::Candidate(p) => (Some(p.id), None),
            LinkedProfile::Employer(p) => (None, Some(p.id)),
            LinkedProfile::None => (None, None),
        };
        let token = self
            .state
            .sessions
            .issue(&user, candidate_id, employer_id)
            .unwrap();
        Account {
            user,
            token,
            candidate_id,
            employer_id,
        }
    }

    pub async fn candidate(&self, email: &str) -> Account {
        self.account(email, "Casey Candidate", Role::Candidate).await
    }

    pub async fn employer(&self, email: &str) -> Account {
        self.account(email, "Erin Employer", Role::Employer).await
    }

    pub async fn admin(&self, email: &str) -> Account {
        self.account(email, "Alex Admin", Role::Admin).await
    }

    /// Insert a job for `employer` directly in `status`.
    pub async fn job(&self, employer: &Account, status: JobStatus) -> Job {
        let mut job = Job::new(
            employer.employer_id.unwrap(),
            "Chief Medical Officer",
            "Lead clinical operations across a 12-hospital system.",
            "Boston, MA",
            status,
        );
        if status == JobStatus::Live {
            let (published_at, expires_at) = Job::listing_window(chrono::Utc::now());
            job.published_at = Some(published_at);
            job.expires_at = Some(expires_at);
        }
        self.state.repos.jobs.insert(&job).await.unwrap();
        job
    }

    pub async fn notification_count(&self, user_id: Uuid) -> usize {
        self.state
            .repos
            .notifications
            .list(user_id, false, 100)
            .await
            .unwrap()
            .len()
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }
}

/// JSON request with an optional bearer token.
pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Bodyless request with an optional bearer token.
pub fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Single-file multipart upload in the `file` field.
pub fn multipart_request(
    uri: &str,
    token: &str,
    file_name: &str,
    content_type: &str,
    data: &[u8],
) -> Request<Body> {
    let boundary = "execboard-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}
