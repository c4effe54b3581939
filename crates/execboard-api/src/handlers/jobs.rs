//! Job posting handlers.

use axum::extract::State;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use execboard_db::JobTransition;
use execboard_models::{EmploymentType, Job, JobFilter, JobStatus, NotificationKind, Page};

use crate::auth::{EmployerSession, MaybeSession};
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::security::{
    sanitize_optional, sanitize_plain_text, sanitize_single_line, MAX_DESCRIPTION_LENGTH,
    MAX_SHORT_TEXT_LENGTH, MAX_TITLE_LENGTH,
};
use crate::services::Notice;
use crate::state::AppState;
use crate::validation::{check_salary_range, page_request, PathId, ValidatedJson, ValidatedQuery};

#[derive(Debug, Deserialize, Validate)]
pub struct JobSearchQuery {
    #[validate(length(max = 200))]
    pub q: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(length(max = 200))]
    pub specialty: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub remote: Option<bool>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateJobRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 20000, message = "Description must be 1-20000 characters"))]
    pub description: String,
    #[validate(length(min = 1, max = 200, message = "Location must be 1-200 characters"))]
    pub location: String,
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub employment_type: EmploymentType,
    #[validate(length(max = 200))]
    pub specialty: Option<String>,
    #[validate(range(min = 0, message = "Salary must not be negative"))]
    pub salary_min: Option<i32>,
    #[validate(range(min = 0, message = "Salary must not be negative"))]
    pub salary_max: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateJobRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 20000, message = "Description must be 1-20000 characters"))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Location must be 1-200 characters"))]
    pub location: Option<String>,
    pub remote: Option<bool>,
    pub employment_type: Option<EmploymentType>,
    #[validate(length(max = 200))]
    pub specialty: Option<String>,
    #[validate(range(min = 0, message = "Salary must not be negative"))]
    pub salary_min: Option<i32>,
    #[validate(range(min = 0, message = "Salary must not be negative"))]
    pub salary_max: Option<i32>,
}

/// Load a job owned by `employer_id`.
pub(crate) async fn owned_job(state: &AppState, employer_id: Uuid, job_id: Uuid) -> ApiResult<Job> {
    let job = state
        .repos
        .jobs
        .find(job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    if job.employer_id != employer_id {
        return Err(ApiError::forbidden("You do not own this job"));
    }
    Ok(job)
}

fn required_text(field: &str, value: &str, max_len: usize, single_line: bool) -> ApiResult<String> {
    let cleaned = if single_line {
        sanitize_single_line(value, max_len)
    } else {
        sanitize_plain_text(value, max_len)
    };
    if cleaned.is_empty() {
        return Err(ApiError::field(field, format!("{field} must not be blank")));
    }
    Ok(cleaned)
}

/// Search live, unexpired jobs.
pub async fn list_jobs(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<JobSearchQuery>,
) -> ApiResult<ApiResponse<Page<Job>>> {
    let filter = JobFilter {
        query: sanitize_optional(query.q.as_deref(), MAX_SHORT_TEXT_LENGTH),
        location: sanitize_optional(query.location.as_deref(), MAX_SHORT_TEXT_LENGTH),
        specialty: sanitize_optional(query.specialty.as_deref(), MAX_SHORT_TEXT_LENGTH),
        employment_type: query.employment_type,
        remote: query.remote,
    };
    let page = state
        .repos
        .jobs
        .list_public(&filter, page_request(query.page, query.per_page), Utc::now())
        .await?;
    Ok(ApiResponse::ok(page))
}

/// Live jobs are public; anything else only to its owner or an admin.
pub async fn get_job(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    PathId(job_id): PathId,
) -> ApiResult<ApiResponse<Job>> {
    let job = state
        .repos
        .jobs
        .find(job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    let visible = job.is_publicly_visible(Utc::now())
        || session.as_ref().is_some_and(|s| {
            s.is_admin() || s.employer_id.is_some_and(|id| id == job.employer_id)
        });
    if !visible {
        return Err(ApiError::not_found("Job not found"));
    }
    Ok(ApiResponse::ok(job))
}

/// Create a posting. An active subscription skips the posting fee.
pub async fn create_job(
    State(state): State<AppState>,
    EmployerSession { employer_id, .. }: EmployerSession,
    ValidatedJson(request): ValidatedJson<CreateJobRequest>,
) -> ApiResult<ApiResponse<Job>> {
    check_salary_range(request.salary_min, request.salary_max)?;

    let title = required_text("title", &request.title, MAX_TITLE_LENGTH, true)?;
    let description = required_text("description", &request.description, MAX_DESCRIPTION_LENGTH, false)?;
    let location = required_text("location", &request.location, MAX_SHORT_TEXT_LENGTH, true)?;

    let subscribed = state
        .repos
        .payments
        .subscription_for_employer(employer_id)
        .await?
        .is_some_and(|s| s.is_active(Utc::now()));
    let status = if subscribed {
        JobStatus::PendingAdminReview
    } else {
        JobStatus::PendingPayment
    };

    let mut job = Job::new(employer_id, title, description, location, status);
    job.remote = request.remote;
    job.employment_type = request.employment_type;
    job.specialty = sanitize_optional(request.specialty.as_deref(), MAX_SHORT_TEXT_LENGTH);
    job.salary_min = request.salary_min;
    job.salary_max = request.salary_max;

    state.repos.jobs.insert(&job).await?;
    info!(job_id = %job.id, employer_id = %employer_id, status = %job.status, "Job created");

    if job.status == JobStatus::PendingAdminReview {
        let notice = Notice::new(
            NotificationKind::JobSubmitted,
            "Job awaiting review",
            format!("\"{}\" was submitted for review", job.title),
        )
        .with_link("/admin/jobs");
        state.notifier.notify_admins(&notice).await;
    }

    Ok(ApiResponse::created(job))
}

/// Edit a posting before review or after rejection. Editing a rejected job resubmits it.
pub async fn update_job(
    State(state): State<AppState>,
    EmployerSession { employer_id, .. }: EmployerSession,
    PathId(job_id): PathId,
    ValidatedJson(request): ValidatedJson<UpdateJobRequest>,
) -> ApiResult<ApiResponse<Job>> {
    let mut job = owned_job(&state, employer_id, job_id).await?;
    if !job.status.is_editable() {
        return Err(ApiError::conflict("Job can no longer be edited"));
    }

    if let Some(title) = &request.title {
        job.title = required_text("title", title, MAX_TITLE_LENGTH, true)?;
    }
    if let Some(description) = &request.description {
        job.description = required_text("description", description, MAX_DESCRIPTION_LENGTH, false)?;
    }
    if let Some(location) = &request.location {
        job.location = required_text("location", location, MAX_SHORT_TEXT_LENGTH, true)?;
    }
    if let Some(remote) = request.remote {
        job.remote = remote;
    }
    if let Some(employment_type) = request.employment_type {
        job.employment_type = employment_type;
    }
    if request.specialty.is_some() {
        job.specialty = sanitize_optional(request.specialty.as_deref(), MAX_SHORT_TEXT_LENGTH);
    }
    if request.salary_min.is_some() {
        job.salary_min = request.salary_min;
    }
    if request.salary_max.is_some() {
        job.salary_max = request.salary_max;
    }
    check_salary_range(job.salary_min, job.salary_max)?;

    job.updated_at = Utc::now();
    state.repos.jobs.update_content(&job).await?;

    if job.status == JobStatus::Rejected {
        job = state
            .repos
            .jobs
            .transition(
                job.id,
                &JobTransition::new(JobStatus::Rejected, JobStatus::PendingAdminReview),
            )
            .await?
            .ok_or_else(|| ApiError::conflict("Job status changed, please reload"))?;
        info!(job_id = %job.id, "Rejected job resubmitted for review");

        let notice = Notice::new(
            NotificationKind::JobSubmitted,
            "Job resubmitted",
            format!("\"{}\" was edited and resubmitted for review", job.title),
        )
        .with_link("/admin/jobs");
        state.notifier.notify_admins(&notice).await;
    }

    Ok(ApiResponse::ok(job))
}

/// Close a live posting.
pub async fn close_job(
    State(state): State<AppState>,
    EmployerSession { employer_id, .. }: EmployerSession,
    PathId(job_id): PathId,
) -> ApiResult<ApiResponse<Job>> {
    owned_job(&state, employer_id, job_id).await?;

    let job = state
        .repos
        .jobs
        .transition(job_id, &JobTransition::new(JobStatus::Live, JobStatus::Closed))
        .await?
        .ok_or_else(|| ApiError::conflict("Only live jobs can be closed"))?;
    info!(job_id = %job.id, "Job closed");
    Ok(ApiResponse::ok(job))
}

/// Delete an unpaid posting.
pub async fn delete_job(
    State(state): State<AppState>,
    EmployerSession { employer_id, .. }: EmployerSession,
    PathId(job_id): PathId,
) -> ApiResult<ApiResponse<()>> {
    owned_job(&state, employer_id, job_id).await?;

    if !state.repos.jobs.delete(job_id, JobStatus::PendingPayment).await? {
        return Err(ApiError::conflict("Only unpaid jobs can be deleted"));
    }
    info!(job_id = %job_id, "Job deleted");
    Ok(ApiResponse::message("Job deleted"))
}
