//! Session tokens, password hashing and the authorization gate.
//!
//! A session is an HS256 JWT read from `Authorization: Bearer` or, failing
//! that, the `execboard_session` cookie. Every authenticated request also
//! re-reads the user so deleted or suspended accounts lose access at once.

use std::time::Duration;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use execboard_models::{AccountStatus, Role, User};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "execboard_session";

const TOKEN_ISSUER: &str = "execboard";

/// Signed session token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employer_id: Option<Uuid>,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signing and verification keys for session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `user` and its linked profile.
    pub fn issue(
        &self,
        user: &User,
        candidate_id: Option<Uuid>,
        employer_id: Option<Uuid>,
    ) -> ApiResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            candidate_id,
            employer_id,
            iss: TOKEN_ISSUER.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("Failed to sign session token: {e}")))
    }

    pub fn verify(&self, token: &str) -> ApiResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Session token rejected");
                ApiError::unauthorized("Invalid or expired session")
            })
    }
}

/// How the request presented its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Bearer,
    Cookie,
}

/// Read the raw session token from the request headers.
pub fn session_token(headers: &HeaderMap) -> Option<(String, AuthMethod)> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some((token.to_string(), AuthMethod::Bearer));
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .map(|t| (t, AuthMethod::Cookie))
}

/// Authenticated caller.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employer_id: Option<Uuid>,
    #[serde(skip)]
    pub method: AuthMethod,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_role(&self, role: Role) -> ApiResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::forbidden("Insufficient permissions"))
        }
    }

    pub fn require_admin(&self) -> ApiResult<()> {
        self.require_role(Role::Admin)
    }

    /// Candidate role with a linked candidate profile.
    pub fn candidate_id(&self) -> ApiResult<Uuid> {
        self.require_role(Role::Candidate)?;
        self.candidate_id
            .ok_or_else(|| ApiError::forbidden("Candidate profile required"))
    }

    /// Employer role with a linked employer profile.
    pub fn employer_id(&self) -> ApiResult<Uuid> {
        self.require_role(Role::Employer)?;
        self.employer_id
            .ok_or_else(|| ApiError::forbidden("Employer profile required"))
    }

    /// Actions an account may not take against itself.
    pub fn ensure_not_self(&self, target_user_id: Uuid) -> ApiResult<()> {
        if self.user_id == target_user_id {
            Err(ApiError::bad_request(
                "You cannot change your own account status",
            ))
        } else {
            Ok(())
        }
    }

    async fn resolve(parts: &Parts, state: &AppState) -> ApiResult<Self> {
        let (token, method) = session_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        let claims = state.sessions.verify(&token)?;

        let user = state
            .repos
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;
        if user.status == AccountStatus::Suspended {
            return Err(ApiError::forbidden("Account suspended"));
        }

        Ok(Self {
            user_id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            candidate_id: claims.candidate_id,
            employer_id: claims.employer_id,
            method,
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(session.clone());
        }
        let session = Session::resolve(parts, state).await?;
        parts.extensions.insert(session.clone());
        Ok(session)
    }
}

/// Session if one is present and valid; anonymous otherwise.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Session>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if session_token(&parts.headers).is_none() {
            return Ok(Self(None));
        }
        match Session::from_request_parts(parts, state).await {
            Ok(session) => Ok(Self(Some(session))),
            Err(ApiError::ServiceUnavailable(msg)) => Err(ApiError::ServiceUnavailable(msg)),
            Err(_) => Ok(Self(None)),
        }
    }
}

/// Admin caller. Rejects during extraction, before any body is read.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        session.require_admin()?;
        Ok(Self(session))
    }
}

/// Candidate caller with a linked candidate profile.
#[derive(Debug, Clone)]
pub struct CandidateSession {
    pub session: Session,
    pub candidate_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for CandidateSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        let candidate_id = session.candidate_id()?;
        Ok(Self {
            session,
            candidate_id,
        })
    }
}

/// Employer caller with a linked employer profile.
#[derive(Debug, Clone)]
pub struct EmployerSession {
    pub session: Session,
    pub employer_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for EmployerSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        let employer_id = session.employer_id()?;
        Ok(Self {
            session,
            employer_id,
        })
    }
}

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal(format!("password hashing failed: {e}")))
}

/// Check a password against a stored PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Session cookie carrying `token`. Expiry is enforced by the token itself.
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Cookie matching the session cookie's path, for removal from a jar.
pub fn session_cookie_removal() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn user(role: Role) -> User {
        User::new("cfo@example.org", "hash", "Pat Doe", role)
    }

    #[test]
    fn test_token_roundtrip_preserves_profile_ids() {
        let keys = SessionKeys::new("a-test-secret-that-is-long-enough!!", Duration::from_secs(60));
        let employer_id = Uuid::new_v4();
        let token = keys.issue(&user(Role::Employer), None, Some(employer_id)).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.role, Role::Employer);
        assert_eq!(claims.employer_id, Some(employer_id));
        assert_eq!(claims.candidate_id, None);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let a = SessionKeys::new("secret-a-secret-a-secret-a-secret-a", Duration::from_secs(60));
        let b = SessionKeys::new("secret-b-secret-b-secret-b-secret-b", Duration::from_secs(60));
        let token = a.issue(&user(Role::Candidate), None, None).unwrap();
        assert!(matches!(b.verify(&token), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_bearer_takes_precedence_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("execboard_session=xyz"),
        );
        assert_eq!(
            session_token(&headers),
            Some(("abc".to_string(), AuthMethod::Bearer))
        );

        headers.remove(header::AUTHORIZATION);
        assert_eq!(
            session_token(&headers),
            Some(("xyz".to_string(), AuthMethod::Cookie))
        );
    }

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("Sup3r-secret").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Sup3r-secret", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("Sup3r-secret", "not-a-phc-string"));
    }

    fn session(role: Role) -> Session {
        Session {
            user_id: Uuid::new_v4(),
            email: "x@example.org".to_string(),
            name: "X".to_string(),
            role,
            candidate_id: None,
            employer_id: None,
            method: AuthMethod::Bearer,
        }
    }

    #[test]
    fn test_gate_role_and_profile() {
        let candidate = session(Role::Candidate);
        assert!(matches!(candidate.employer_id(), Err(ApiError::Forbidden(_))));
        assert!(matches!(candidate.candidate_id(), Err(ApiError::Forbidden(_))));

        let mut with_profile = session(Role::Candidate);
        let id = Uuid::new_v4();
        with_profile.candidate_id = Some(id);
        assert_eq!(with_profile.candidate_id().unwrap(), id);
        assert!(with_profile.require_admin().is_err());
    }

    #[test]
    fn test_self_guard() {
        let admin = session(Role::Admin);
        assert!(matches!(
            admin.ensure_not_self(admin.user_id),
            Err(ApiError::BadRequest(_))
        ));
        assert!(admin.ensure_not_self(Uuid::new_v4()).is_ok());
    }
}
