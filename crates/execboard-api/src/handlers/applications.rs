//! Application handlers: apply, withdraw, status changes and resume access.

use std::time::Duration;

use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use execboard_db::DbError;
use execboard_models::{Application, ApplicationStatus, Job, NotificationKind, Role};

use crate::auth::{CandidateSession, EmployerSession, Session};
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::security::{sanitize_optional, MAX_MESSAGE_LENGTH};
use crate::services::Notice;
use crate::state::AppState;
use crate::validation::{PathId, ValidatedJson};

/// Lifetime of presigned resume links.
pub(crate) const RESUME_URL_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ApplyRequest {
    #[validate(length(max = 10000, message = "Cover letter must be at most 10000 characters"))]
    pub cover_letter: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateApplicationStatusRequest {
    pub status: ApplicationStatus,
}

#[derive(Debug, Serialize)]
pub struct ResumeLink {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub expires_in_secs: u64,
}

async fn find_application(state: &AppState, id: uuid::Uuid) -> ApiResult<Application> {
    state
        .repos
        .applications
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Application not found"))
}

async fn job_of(state: &AppState, application: &Application) -> ApiResult<Job> {
    state
        .repos
        .jobs
        .find(application.job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))
}

/// Apply to a live job. One application per candidate and job.
pub async fn apply_to_job(
    State(state): State<AppState>,
    CandidateSession { session, candidate_id }: CandidateSession,
    PathId(job_id): PathId,
    ValidatedJson(request): ValidatedJson<ApplyRequest>,
) -> ApiResult<ApiResponse<Application>> {
    let job = state
        .repos
        .jobs
        .find(job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    if !job.is_publicly_visible(Utc::now()) {
        return Err(ApiError::conflict("This job is not accepting applications"));
    }

    let application = Application::new(
        job.id,
        candidate_id,
        sanitize_optional(request.cover_letter.as_deref(), MAX_MESSAGE_LENGTH),
    );
    match state.repos.applications.insert(&application).await {
        Ok(()) => {}
        Err(DbError::Conflict(_)) => {
            return Err(ApiError::conflict("You have already applied to this job"));
        }
        Err(e) => return Err(e.into()),
    }
    info!(application_id = %application.id, job_id = %job.id, "Application submitted");

    let notice = Notice::new(
        NotificationKind::ApplicationReceived,
        "New application",
        format!("{} applied to \"{}\"", session.name, job.title),
    )
    .with_link(format!("/employer/jobs/{}/applications", job.id));
    state.notifier.notify_employer(job.employer_id, &notice).await;

    Ok(ApiResponse::created(application))
}

/// Withdraw one of the caller's applications.
pub async fn withdraw_application(
    State(state): State<AppState>,
    CandidateSession { session, candidate_id }: CandidateSession,
    PathId(application_id): PathId,
) -> ApiResult<ApiResponse<Application>> {
    let application = find_application(&state, application_id).await?;
    if application.candidate_id != candidate_id {
        return Err(ApiError::forbidden("You do not own this application"));
    }
    if application.status.is_terminal() {
        return Err(ApiError::conflict("Application can no longer be withdrawn"));
    }

    let updated = state
        .repos
        .applications
        .set_status(application.id, application.status, ApplicationStatus::Withdrawn)
        .await?
        .ok_or_else(|| ApiError::conflict("Application status changed, please reload"))?;
    info!(application_id = %updated.id, "Application withdrawn");

    if let Ok(job) = job_of(&state, &updated).await {
        let notice = Notice::new(
            NotificationKind::ApplicationStatusChanged,
            "Application withdrawn",
            format!("{} withdrew their application to \"{}\"", session.name, job.title),
        )
        .with_link(format!("/employer/jobs/{}/applications", job.id));
        state.notifier.notify_employer(job.employer_id, &notice).await;
    }

    Ok(ApiResponse::ok(updated))
}

/// Move an application along the hiring pipeline (job owner only).
pub async fn update_application_status(
    State(state): State<AppState>,
    EmployerSession { employer_id, .. }: EmployerSession,
    PathId(application_id): PathId,
    ValidatedJson(request): ValidatedJson<UpdateApplicationStatusRequest>,
) -> ApiResult<ApiResponse<Application>> {
    let application = find_application(&state, application_id).await?;
    let job = job_of(&state, &application).await?;
    if job.employer_id != employer_id {
        return Err(ApiError::forbidden("You do not own this job"));
    }

    let next = request.status;
    if !application.status.can_employer_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "Cannot move application from {} to {}",
            application.status, next
        )));
    }

    let updated = state
        .repos
        .applications
        .set_status(application.id, application.status, next)
        .await?
        .ok_or_else(|| ApiError::conflict("Application status changed, please reload"))?;
    info!(application_id = %updated.id, status = %next, "Application status updated");

    let notice = Notice::new(
        NotificationKind::ApplicationStatusChanged,
        "Application update",
        format!("Your application to \"{}\" is now {}", job.title, next),
    )
    .with_link("/candidate/applications");
    state
        .notifier
        .notify_candidate(updated.candidate_id, &notice)
        .await;

    Ok(ApiResponse::ok(updated))
}

/// Short-lived download link for an applicant's resume.
pub async fn application_resume(
    State(state): State<AppState>,
    session: Session,
    PathId(application_id): PathId,
) -> ApiResult<ApiResponse<ResumeLink>> {
    let application = find_application(&state, application_id).await?;
    match session.role {
        Role::Admin => {}
        Role::Employer => {
            let employer_id = session.employer_id()?;
            let job = job_of(&state, &application).await?;
            if job.employer_id != employer_id {
                return Err(ApiError::forbidden("You do not own this job"));
            }
        }
        Role::Candidate => {
            if session.candidate_id()? != application.candidate_id {
                return Err(ApiError::forbidden("You do not own this application"));
            }
        }
    }

    let storage = state
        .storage
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("File storage is not configured"))?;
    let candidate = state
        .repos
        .profiles
        .candidate_by_id(application.candidate_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Candidate not found"))?;
    let key = candidate
        .resume_key
        .ok_or_else(|| ApiError::not_found("Candidate has not uploaded a resume"))?;

    let url = storage.presign_get(&key, RESUME_URL_TTL).await?;
    Ok(ApiResponse::ok(ResumeLink {
        url,
        file_name: candidate.resume_file_name,
        expires_in_secs: RESUME_URL_TTL.as_secs(),
    }))
}
