//! API middleware.

use std::any::Any;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, OriginalUri, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tracing::{info, warn, Span};
use uuid::Uuid;

use execboard_kv::{CsrfStore, RateLimiter, RatePolicy};

use crate::auth::{session_token, AuthMethod};
use crate::error::{ApiError, ErrorBody, INTERNAL_ERROR_MESSAGE};
use crate::metrics;

/// Header carrying the CSRF token on cookie-authenticated writes.
pub const CSRF_HEADER: &str = "x-csrf-token";

const REQUEST_ID_HEADER: &str = "x-request-id";
const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Rate limiter bound to one route group's policy.
#[derive(Clone)]
pub struct RateGuard {
    pub limiter: RateLimiter,
    pub policy: RatePolicy,
}

impl RateGuard {
    pub fn new(limiter: RateLimiter, policy: RatePolicy) -> Self {
        Self { limiter, policy }
    }
}

/// Create CORS layer.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed_headers = [
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        header::ACCEPT,
        header::ORIGIN,
        HeaderName::from_static(CSRF_HEADER),
    ];

    let exposed_headers = [
        header::CONTENT_LENGTH,
        header::CONTENT_TYPE,
        header::RETRY_AFTER,
        HeaderName::from_static(REQUEST_ID_HEADER),
        HeaderName::from_static(RATE_LIMIT_LIMIT),
        HeaderName::from_static(RATE_LIMIT_REMAINING),
    ];

    let allowed_methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if origins.iter().any(|o| o == "*") {
        // Wildcard origin: browsers refuse credentials, so none are allowed
        CorsLayer::new()
            .allow_methods(AnyOrigin)
            .allow_headers(AnyOrigin)
            .expose_headers(AnyOrigin)
            .allow_origin(AnyOrigin)
            .max_age(Duration::from_secs(600))
    } else {
        // tower-http rejects credentials combined with wildcard headers
        let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_methods(allowed_methods)
            .allow_headers(allowed_headers)
            .expose_headers(exposed_headers)
            .allow_credentials(true)
            .allow_origin(origins)
            .max_age(Duration::from_secs(600))
    }
}

/// Security headers middleware.
pub async fn security_headers(request: Request<Body>, next: Next) -> Response<Body> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        "permissions-policy",
        HeaderValue::from_static(
            "accelerometer=(), camera=(), geolocation=(), gyroscope=(), magnetometer=(), microphone=(), payment=(), usb=()",
        ),
    );
    headers.insert(
        "cross-origin-resource-policy",
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        "x-permitted-cross-domain-policies",
        HeaderValue::from_static("none"),
    );

    response
}

/// Rewrite bare framework errors into the JSON error envelope.
///
/// Covers 405 from method routing and 413 from the body limit layer, which
/// are produced outside any handler.
pub async fn envelope_errors(request: Request<Body>, next: Next) -> Response<Body> {
    let response = next.run(request).await;
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if is_json {
        return response;
    }

    let error = match response.status() {
        StatusCode::METHOD_NOT_ALLOWED => ApiError::MethodNotAllowed,
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge,
        _ => return response,
    };
    let allow = response.headers().get(header::ALLOW).cloned();
    let mut rewritten = error.into_response();
    if let Some(allow) = allow {
        rewritten.headers_mut().insert(header::ALLOW, allow);
    }
    rewritten
}

/// Request ID middleware.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response<Body> {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(request_id.clone());
    Span::current().record("request_id", &request_id);

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// Request logging middleware.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let duration = start.elapsed();

    // Skip health check logging
    if uri.path() != "/health" && uri.path() != "/ready" {
        info!(
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed"
        );
    }

    response
}

/// Count the request against the route group's policy.
///
/// The counter store failing lets the request through.
pub async fn rate_limit(
    State(guard): State<RateGuard>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let ip = client_ip(&request);
    let method = request.method().as_str().to_string();

    let decision = match guard
        .limiter
        .check_policy(&guard.policy, &ip, &method, &path)
        .await
    {
        Ok(decision) => decision,
        Err(e) => {
            warn!(policy = %guard.policy.name, error = %e, "Rate limit check failed, allowing request");
            return next.run(request).await;
        }
    };

    let mut response = if decision.limited {
        warn!(policy = %guard.policy.name, ip = %ip, path = %path, "Rate limit exceeded");
        metrics::record_rate_limit_hit(&guard.policy.name, &path);
        ApiError::RateLimited {
            retry_after_secs: decision.window_secs,
        }
        .into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    response
}

/// Require a valid CSRF token on cookie-authenticated writes.
///
/// Safe methods, bearer-authenticated and anonymous requests pass through.
/// Unlike rate limiting, a store failure rejects the request.
pub async fn csrf_protect(
    State(csrf): State<CsrfStore>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if is_safe_method(request.method()) {
        return next.run(request).await;
    }
    match session_token(request.headers()) {
        Some((_, AuthMethod::Cookie)) => {}
        _ => return next.run(request).await,
    }

    let Some(token) = csrf_header(request.headers()) else {
        return ApiError::forbidden("Missing CSRF token").into_response();
    };
    match csrf.verify(&token).await {
        Ok(true) => next.run(request).await,
        Ok(false) => ApiError::forbidden("Invalid CSRF token").into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn csrf_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Client IP: first `X-Forwarded-For` hop, then `X-Real-IP`, then the socket.
pub fn client_ip(request: &Request<Body>) -> String {
    let headers = request.headers();
    if let Some(first) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return first.to_string();
    }

    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return real_ip.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Turn a handler panic into the generic 500 envelope.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "Handler panicked");

    (
        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(ErrorBody::new(INTERNAL_ERROR_MESSAGE, None)),
    )
        .into_response()
}
