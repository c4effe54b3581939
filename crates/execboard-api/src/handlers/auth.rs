//! Registration, login and session handlers.

use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use execboard_db::{DbError, LinkedProfile};
use execboard_models::{AccountStatus, CandidateProfile, EmployerProfile, Role, User};

use crate::auth::{hash_password, session_cookie, session_cookie_removal, verify_password, Session};
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::security::{sanitize_single_line, MAX_SHORT_TEXT_LENGTH};
use crate::state::AppState;
use crate::validation::ValidatedJson;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    pub role: Role,
    /// Required for employers
    #[validate(length(min = 1, max = 200))]
    pub company_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employer_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CsrfResponse {
    pub token: String,
    pub expires_in_secs: u64,
}

/// Register a candidate or employer account with its profile.
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> ApiResult<(CookieJar, ApiResponse<AuthResponse>)> {
    if !request.role.is_self_registrable() {
        return Err(ApiError::field(
            "role",
            "Only candidate and employer accounts can register",
        ));
    }

    let name = sanitize_single_line(&request.name, MAX_SHORT_TEXT_LENGTH);
    if name.is_empty() {
        return Err(ApiError::field("name", "Name is required"));
    }

    let password_hash = hash_password(&request.password)?;
    let user = User::new(request.email.trim(), password_hash, name, request.role);

    let profile = match request.role {
        Role::Candidate => LinkedProfile::Candidate(CandidateProfile::new(user.id)),
        Role::Employer => {
            let company = request
                .company_name
                .as_deref()
                .map(|c| sanitize_single_line(c, MAX_SHORT_TEXT_LENGTH))
                .filter(|c| !c.is_empty())
                .ok_or_else(|| {
                    ApiError::field("company_name", "Company name is required for employers")
                })?;
            LinkedProfile::Employer(EmployerProfile::new(user.id, company))
        }
        Role::Admin => LinkedProfile::None,
    };

    match state.repos.users.create(&user, &profile).await {
        Ok(()) => {}
        Err(DbError::Conflict(_)) => {
            return Err(ApiError::conflict("An account with this email already exists"));
        }
        Err(e) => return Err(e.into()),
    }

    let (candidate_id, employer_id) = match &profile {
        LinkedProfile::Candidate(p) => (Some(p.id), None),
        LinkedProfile::Employer(p) => (None, Some(p.id)),
        LinkedProfile::None => (None, None),
    };

    info!(user_id = %user.id, role = %user.role, "Account registered");

    let token = state.sessions.issue(&user, candidate_id, employer_id)?;
    let jar = jar.add(session_cookie(token.clone(), state.config.is_production()));
    Ok((
        jar,
        ApiResponse::created(AuthResponse {
            token,
            user,
            candidate_id,
            employer_id,
        }),
    ))
}

/// Exchange credentials for a session.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<(CookieJar, ApiResponse<AuthResponse>)> {
    let email = request.email.trim().to_lowercase();
    let user = state
        .repos
        .users
        .find_by_email(&email)
        .await?
        .filter(|u| verify_password(&request.password, &u.password_hash))
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    if user.status == AccountStatus::Suspended {
        return Err(ApiError::forbidden("Account suspended"));
    }

    let (candidate_id, employer_id) = match user.role {
        Role::Candidate => (
            state
                .repos
                .profiles
                .candidate_by_user(user.id)
                .await?
                .map(|p| p.id),
            None,
        ),
        Role::Employer => (
            None,
            state
                .repos
                .profiles
                .employer_by_user(user.id)
                .await?
                .map(|p| p.id),
        ),
        Role::Admin => (None, None),
    };

    info!(user_id = %user.id, "User logged in");

    let token = state.sessions.issue(&user, candidate_id, employer_id)?;
    let jar = jar.add(session_cookie(token.clone(), state.config.is_production()));
    Ok((
        jar,
        ApiResponse::ok(AuthResponse {
            token,
            user,
            candidate_id,
            employer_id,
        }),
    ))
}

/// Current session.
pub async fn current_session(session: Session) -> ApiResponse<Session> {
    ApiResponse::ok(session)
}

/// Clear the session cookie. Bearer tokens simply expire.
pub async fn logout(jar: CookieJar) -> (CookieJar, ApiResponse<()>) {
    (
        jar.remove(session_cookie_removal()),
        ApiResponse::message("Logged out"),
    )
}

/// Issue a CSRF token for cookie-authenticated clients.
pub async fn issue_csrf_token(State(state): State<AppState>) -> ApiResult<ApiResponse<CsrfResponse>> {
    let token = state.csrf.issue().await?;
    Ok(ApiResponse::ok(CsrfResponse {
        token,
        expires_in_secs: state.csrf.ttl().as_secs(),
    }))
}
