//! API routes.
//!
//! Routes are grouped by rate-limit policy. Each group is wrapped as
//! rate limit, then CSRF, then the handler, whose extractors authenticate,
//! check the role and validate input in that order.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;

use execboard_kv::RatePolicy;

use crate::error::ApiError;
use crate::handlers::{
    admin, ai, applications, auth, candidates, employers, health, jobs, messages, notifications,
    payments, ready, uploads, webhooks,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, csrf_protect, envelope_errors, panic_response, rate_limit, request_id,
    request_logging, security_headers, RateGuard,
};
use crate::state::AppState;

/// Apply the group's rate limit (outermost) and CSRF check.
fn guarded(router: Router<AppState>, state: &AppState, policy: &RatePolicy) -> Router<AppState> {
    router
        .layer(middleware::from_fn_with_state(
            state.csrf.clone(),
            csrf_protect,
        ))
        .layer(middleware::from_fn_with_state(
            RateGuard::new(state.rate_limiter.clone(), policy.clone()),
            rate_limit,
        ))
}

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let policies = state.config.rate_limits.clone();

    let auth_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login));

    let ai_routes = Router::new()
        .route("/api/ai/resume-analysis", post(ai::resume_analysis))
        .route("/api/ai/job-match", post(ai::job_match))
        .route("/api/ai/job-description", post(ai::job_description));

    let upload_routes = Router::new().route("/api/uploads/resume", post(uploads::upload_resume));

    let session_routes = Router::new()
        .route("/api/csrf", get(auth::issue_csrf_token))
        .route("/api/auth/session", get(auth::current_session))
        .route("/api/auth/logout", post(auth::logout));

    let job_routes = Router::new()
        .route("/api/jobs", get(jobs::list_jobs).post(jobs::create_job))
        .route(
            "/api/jobs/:id",
            get(jobs::get_job)
                .patch(jobs::update_job)
                .delete(jobs::delete_job),
        )
        .route("/api/jobs/:id/close", post(jobs::close_job))
        .route("/api/jobs/:id/apply", post(applications::apply_to_job));

    let candidate_routes = Router::new()
        .route(
            "/api/candidates/me",
            get(candidates::get_my_profile).patch(candidates::update_my_profile),
        )
        .route("/api/candidates/me/applications", get(candidates::my_applications))
        .route("/api/candidates/me/resume", get(candidates::my_resume));

    let application_routes = Router::new()
        .route("/api/applications/:id", delete(applications::withdraw_application))
        .route(
            "/api/applications/:id/status",
            patch(applications::update_application_status),
        )
        .route("/api/applications/:id/resume", get(applications::application_resume));

    let employer_routes = Router::new()
        .route(
            "/api/employers/me",
            get(employers::get_my_profile).patch(employers::update_my_profile),
        )
        .route("/api/employers/me/jobs", get(employers::my_jobs))
        .route(
            "/api/employers/me/jobs/:id/applications",
            get(employers::job_applications),
        );

    let message_routes = Router::new()
        .route(
            "/api/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route("/api/messages/unread-count", get(messages::unread_count))
        .route("/api/messages/:id/read", patch(messages::mark_message_read));

    let notification_routes = Router::new()
        .route("/api/notifications", get(notifications::list_notifications))
        .route(
            "/api/notifications/:id/read",
            patch(notifications::mark_notification_read),
        )
        .route("/api/notifications/read-all", post(notifications::mark_all_read));

    let payment_routes = Router::new()
        .route("/api/payments", get(payments::list_payments))
        .route("/api/payments/checkout", post(payments::create_checkout))
        .route("/api/payments/subscribe", post(payments::subscribe))
        .route("/api/subscriptions/me", get(payments::my_subscription));

    let admin_routes = Router::new()
        .route("/api/admin/jobs", get(admin::list_jobs))
        .route("/api/admin/jobs/:id/approve", post(admin::approve_job))
        .route("/api/admin/jobs/:id/reject", post(admin::reject_job))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/:id/status", patch(admin::update_user_status))
        .route("/api/admin/employers/:id/verify", patch(admin::verify_employer))
        .route("/api/admin/stats", get(admin::stats));

    let default_routes = Router::new()
        .merge(session_routes)
        .merge(job_routes)
        .merge(candidate_routes)
        .merge(application_routes)
        .merge(employer_routes)
        .merge(message_routes)
        .merge(notification_routes)
        .merge(payment_routes)
        .merge(admin_routes);

    // Signed by the payment processor; no session, CSRF or client rate limit
    let webhook_routes =
        Router::new().route("/api/webhooks/stripe", post(webhooks::stripe_webhook));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    let max_body_size = state.config.max_body_size;
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .merge(guarded(auth_routes, &state, &policies.auth))
        .merge(guarded(ai_routes, &state, &policies.ai))
        .merge(guarded(upload_routes, &state, &policies.upload))
        .merge(guarded(default_routes, &state, &policies.default))
        .merge(webhook_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .fallback(|| async { ApiError::not_found("Route not found") })
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(middleware::from_fn(envelope_errors))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .with_state(state)
}
