//! Admin handlers: job review, account moderation and platform stats.

use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use execboard_db::JobTransition;
use execboard_models::{
    AccountStatus, EmployerProfile, Job, JobStatus, NotificationKind, Page, Role, User,
};

use crate::auth::AdminSession;
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::security::{sanitize_plain_text, MAX_SUMMARY_LENGTH};
use crate::services::Notice;
use crate::state::AppState;
use crate::validation::{page_request, PathId, ValidatedJson, ValidatedQuery};

#[derive(Debug, Deserialize, Validate)]
pub struct AdminJobsQuery {
    pub status: Option<JobStatus>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectJobRequest {
    #[validate(length(min = 1, max = 1000, message = "Reason must be 1-1000 characters"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminUsersQuery {
    pub role: Option<Role>,
    pub status: Option<AccountStatus>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserStatusRequest {
    pub status: AccountStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyEmployerRequest {
    pub verified: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct PlatformStats {
    pub candidates: u64,
    pub employers: u64,
    pub admins: u64,
    pub jobs_pending_payment: u64,
    pub jobs_pending_review: u64,
    pub jobs_live: u64,
    pub jobs_rejected: u64,
    pub jobs_closed: u64,
    pub applications: u64,
    pub revenue_cents: i64,
}

/// Resolve why a review transition did not apply: missing job or wrong status.
async fn review_conflict(state: &AppState, job_id: uuid::Uuid) -> ApiError {
    match state.repos.jobs.find(job_id).await {
        Ok(Some(_)) => ApiError::conflict("Job is not pending review"),
        Ok(None) => ApiError::not_found("Job not found"),
        Err(e) => e.into(),
    }
}

pub async fn list_jobs(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedQuery(query): ValidatedQuery<AdminJobsQuery>,
) -> ApiResult<ApiResponse<Page<Job>>> {
    let status = query.status.unwrap_or(JobStatus::PendingAdminReview);
    let page = state
        .repos
        .jobs
        .list_by_status(status, page_request(query.page, query.per_page))
        .await?;
    Ok(ApiResponse::ok(page))
}

/// Publish a job under review. Only the first approval takes effect.
pub async fn approve_job(
    State(state): State<AppState>,
    AdminSession(session): AdminSession,
    PathId(job_id): PathId,
) -> ApiResult<ApiResponse<Job>> {
    let (published_at, expires_at) = Job::listing_window(Utc::now());
    let transition = JobTransition::new(JobStatus::PendingAdminReview, JobStatus::Live)
        .with_listing_window(published_at, expires_at);
    let Some(job) = state.repos.jobs.transition(job_id, &transition).await? else {
        return Err(review_conflict(&state, job_id).await);
    };
    info!(job_id = %job.id, admin_id = %session.user_id, "Job approved");

    let notice = Notice::new(
        NotificationKind::JobApproved,
        "Job approved",
        format!("\"{}\" is now live", job.title),
    )
    .with_link(format!("/jobs/{}", job.id));
    state.notifier.notify_employer(job.employer_id, &notice).await;

    Ok(ApiResponse::ok(job))
}

pub async fn reject_job(
    State(state): State<AppState>,
    AdminSession(session): AdminSession,
    PathId(job_id): PathId,
    ValidatedJson(request): ValidatedJson<RejectJobRequest>,
) -> ApiResult<ApiResponse<Job>> {
    let reason = sanitize_plain_text(&request.reason, MAX_SUMMARY_LENGTH);
    if reason.is_empty() {
        return Err(ApiError::field("reason", "A rejection reason is required"));
    }

    let transition = JobTransition::new(JobStatus::PendingAdminReview, JobStatus::Rejected)
        .with_rejection_reason(reason.clone());
    let Some(job) = state.repos.jobs.transition(job_id, &transition).await? else {
        return Err(review_conflict(&state, job_id).await);
    };
    info!(job_id = %job.id, admin_id = %session.user_id, "Job rejected");

    let notice = Notice::new(
        NotificationKind::JobRejected,
        "Job needs changes",
        format!("\"{}\" was not approved: {}", job.title, reason),
    )
    .with_link(format!("/employer/jobs/{}", job.id));
    state.notifier.notify_employer(job.employer_id, &notice).await;

    Ok(ApiResponse::ok(job))
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedQuery(query): ValidatedQuery<AdminUsersQuery>,
) -> ApiResult<ApiResponse<Page<User>>> {
    let page = state
        .repos
        .users
        .list(query.role, query.status, page_request(query.page, query.per_page))
        .await?;
    Ok(ApiResponse::ok(page))
}

/// Suspend or reactivate an account. Admins cannot change their own status.
pub async fn update_user_status(
    State(state): State<AppState>,
    AdminSession(session): AdminSession,
    PathId(user_id): PathId,
    ValidatedJson(request): ValidatedJson<UpdateUserStatusRequest>,
) -> ApiResult<ApiResponse<User>> {
    session.ensure_not_self(user_id)?;

    let user = state
        .repos
        .users
        .set_status(user_id, request.status)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    info!(user_id = %user.id, status = %user.status, admin_id = %session.user_id, "Account status changed");

    let notice = Notice::new(
        NotificationKind::AccountStatusChanged,
        "Account status changed",
        format!("Your account is now {}", user.status.as_str().to_lowercase()),
    );
    state.notifier.notify_user(user.id, &notice).await;

    Ok(ApiResponse::ok(user))
}

pub async fn verify_employer(
    State(state): State<AppState>,
    _admin: AdminSession,
    PathId(employer_id): PathId,
    ValidatedJson(request): ValidatedJson<VerifyEmployerRequest>,
) -> ApiResult<ApiResponse<EmployerProfile>> {
    let profile = state
        .repos
        .profiles
        .set_employer_verified(employer_id, request.verified)
        .await?
        .ok_or_else(|| ApiError::not_found("Employer not found"))?;
    info!(employer_id = %profile.id, verified = profile.verified, "Employer verification changed");
    Ok(ApiResponse::ok(profile))
}

pub async fn stats(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> ApiResult<ApiResponse<PlatformStats>> {
    let mut stats = PlatformStats::default();

    for (role, count) in state.repos.users.count_by_role().await? {
        match role {
            Role::Candidate => stats.candidates = count,
            Role::Employer => stats.employers = count,
            Role::Admin => stats.admins = count,
        }
    }
    for (status, count) in state.repos.jobs.count_by_status().await? {
        match status {
            JobStatus::PendingPayment => stats.jobs_pending_payment = count,
            JobStatus::PendingAdminReview => stats.jobs_pending_review = count,
            JobStatus::Live => stats.jobs_live = count,
            JobStatus::Rejected => stats.jobs_rejected = count,
            JobStatus::Closed => stats.jobs_closed = count,
        }
    }
    stats.applications = state.repos.applications.count().await?;
    stats.revenue_cents = state.repos.payments.total_paid_cents().await?;

    Ok(ApiResponse::ok(stats))
}
