//! Candidate profile handlers.

use axum::extract::State;
use chrono::Utc;
use uuid::Uuid;
use serde::{Deserialize, Serialize};
use validator::Validate;

use execboard_models::{Application, CandidateProfile, JobStatus};

use crate::auth::CandidateSession;
use crate::error::{ApiError, ApiResult};
use crate::handlers::applications::{ResumeLink, RESUME_URL_TTL};
use crate::response::ApiResponse;
use crate::security::{
    sanitize_optional, sanitize_tags, MAX_SHORT_TEXT_LENGTH, MAX_SUMMARY_LENGTH,
};
use crate::state::AppState;
use crate::validation::ValidatedJson;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCandidateRequest {
    #[validate(length(max = 200))]
    pub headline: Option<String>,
    #[validate(length(max = 5000))]
    pub summary: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(range(min = 0, max = 70, message = "Years of experience must be 0-70"))]
    pub years_experience: Option<i32>,
    #[validate(length(max = 20, message = "At most 20 specialties"))]
    pub specialties: Option<Vec<String>>,
}

/// Application with enough job context to render a list.
#[derive(Debug, Serialize)]
pub struct CandidateApplication {
    #[serde(flatten)]
    pub application: Application,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_status: Option<JobStatus>,
}

async fn load_profile(state: &AppState, candidate_id: Uuid) -> ApiResult<CandidateProfile> {
    state
        .repos
        .profiles
        .candidate_by_id(candidate_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Candidate profile not found"))
}

pub async fn get_my_profile(
    State(state): State<AppState>,
    CandidateSession { candidate_id, .. }: CandidateSession,
) -> ApiResult<ApiResponse<CandidateProfile>> {
    Ok(ApiResponse::ok(load_profile(&state, candidate_id).await?))
}

/// Partial update. Blank strings clear a field.
pub async fn update_my_profile(
    State(state): State<AppState>,
    CandidateSession { candidate_id, .. }: CandidateSession,
    ValidatedJson(request): ValidatedJson<UpdateCandidateRequest>,
) -> ApiResult<ApiResponse<CandidateProfile>> {
    let mut profile = load_profile(&state, candidate_id).await?;

    if let Some(headline) = &request.headline {
        profile.headline = sanitize_optional(Some(headline), MAX_SHORT_TEXT_LENGTH);
    }
    if let Some(summary) = &request.summary {
        profile.summary = sanitize_optional(Some(summary), MAX_SUMMARY_LENGTH);
    }
    if let Some(location) = &request.location {
        profile.location = sanitize_optional(Some(location), MAX_SHORT_TEXT_LENGTH);
    }
    if request.years_experience.is_some() {
        profile.years_experience = request.years_experience;
    }
    if let Some(specialties) = &request.specialties {
        profile.specialties = sanitize_tags(specialties, MAX_SHORT_TEXT_LENGTH);
    }
    profile.updated_at = Utc::now();

    state.repos.profiles.update_candidate(&profile).await?;
    Ok(ApiResponse::ok(profile))
}

pub async fn my_applications(
    State(state): State<AppState>,
    CandidateSession { candidate_id, .. }: CandidateSession,
) -> ApiResult<ApiResponse<Vec<CandidateApplication>>> {
    let applications = state
        .repos
        .applications
        .list_by_candidate(candidate_id)
        .await?;

    let mut items = Vec::with_capacity(applications.len());
    for application in applications {
        let job = state.repos.jobs.find(application.job_id).await?;
        items.push(CandidateApplication {
            job_title: job.as_ref().map(|j| j.title.clone()),
            job_status: job.map(|j| j.status),
            application,
        });
    }
    Ok(ApiResponse::ok(items))
}

/// Download link for the caller's own resume.
pub async fn my_resume(
    State(state): State<AppState>,
    CandidateSession { candidate_id, .. }: CandidateSession,
) -> ApiResult<ApiResponse<ResumeLink>> {
    let profile = load_profile(&state, candidate_id).await?;
    let key = profile
        .resume_key
        .ok_or_else(|| ApiError::not_found("No resume uploaded"))?;
    let storage = state
        .storage
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("File storage is not configured"))?;

    let url = storage.presign_get(&key, RESUME_URL_TTL).await?;
    Ok(ApiResponse::ok(ResumeLink {
        url,
        file_name: profile.resume_file_name,
        expires_in_secs: RESUME_URL_TTL.as_secs(),
    }))
}
