//! Employer profile handlers.

use axum::extract::State;
use chrono::Utc;
use uuid::Uuid;
use serde::{Deserialize, Serialize};
use validator::Validate;

use execboard_models::{Application, CandidateProfile, EmployerProfile, Job};

use crate::auth::EmployerSession;
use crate::error::{ApiError, ApiResult};
use crate::handlers::jobs::owned_job;
use crate::response::ApiResponse;
use crate::security::{
    sanitize_optional, sanitize_single_line, MAX_SHORT_TEXT_LENGTH, MAX_SUMMARY_LENGTH,
};
use crate::state::AppState;
use crate::validation::{PathId, ValidatedJson};

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEmployerRequest {
    #[validate(length(min = 1, max = 200, message = "Company name must be 1-200 characters"))]
    pub company_name: Option<String>,
    #[validate(length(max = 200))]
    pub organization_type: Option<String>,
    #[validate(length(max = 500))]
    pub website: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
}

/// Applicant row for an employer's job.
#[derive(Debug, Serialize)]
pub struct Applicant {
    #[serde(flatten)]
    pub application: Application,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<CandidateProfile>,
}

async fn load_profile(state: &AppState, employer_id: Uuid) -> ApiResult<EmployerProfile> {
    state
        .repos
        .profiles
        .employer_by_id(employer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Employer profile not found"))
}

/// Accept only absolute http(s) URLs.
fn normalize_website(raw: &str) -> ApiResult<Option<String>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let parsed = url::Url::parse(trimmed)
        .map_err(|_| ApiError::field("website", "Website must be a valid URL"))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(Some(parsed.to_string())),
        _ => Err(ApiError::field(
            "website",
            "Website must be an http or https URL",
        )),
    }
}

pub async fn get_my_profile(
    State(state): State<AppState>,
    EmployerSession { employer_id, .. }: EmployerSession,
) -> ApiResult<ApiResponse<EmployerProfile>> {
    Ok(ApiResponse::ok(load_profile(&state, employer_id).await?))
}

/// Partial update. Blank optional strings clear a field.
pub async fn update_my_profile(
    State(state): State<AppState>,
    EmployerSession { employer_id, .. }: EmployerSession,
    ValidatedJson(request): ValidatedJson<UpdateEmployerRequest>,
) -> ApiResult<ApiResponse<EmployerProfile>> {
    let mut profile = load_profile(&state, employer_id).await?;

    if let Some(name) = &request.company_name {
        let name = sanitize_single_line(name, MAX_SHORT_TEXT_LENGTH);
        if name.is_empty() {
            return Err(ApiError::field("company_name", "Company name is required"));
        }
        profile.company_name = name;
    }
    if let Some(kind) = &request.organization_type {
        profile.organization_type = sanitize_optional(Some(kind), MAX_SHORT_TEXT_LENGTH);
    }
    if let Some(website) = &request.website {
        profile.website = normalize_website(website)?;
    }
    if let Some(description) = &request.description {
        profile.description = sanitize_optional(Some(description), MAX_SUMMARY_LENGTH);
    }
    if let Some(location) = &request.location {
        profile.location = sanitize_optional(Some(location), MAX_SHORT_TEXT_LENGTH);
    }
    profile.updated_at = Utc::now();

    state.repos.profiles.update_employer(&profile).await?;
    Ok(ApiResponse::ok(profile))
}

/// Every job the employer owns, in any status.
pub async fn my_jobs(
    State(state): State<AppState>,
    EmployerSession { employer_id, .. }: EmployerSession,
) -> ApiResult<ApiResponse<Vec<Job>>> {
    let jobs = state.repos.jobs.list_by_employer(employer_id).await?;
    Ok(ApiResponse::ok(jobs))
}

pub async fn job_applications(
    State(state): State<AppState>,
    EmployerSession { employer_id, .. }: EmployerSession,
    PathId(job_id): PathId,
) -> ApiResult<ApiResponse<Vec<Applicant>>> {
    let job = owned_job(&state, employer_id, job_id).await?;

    let applications = state.repos.applications.list_by_job(job.id).await?;
    let mut applicants = Vec::with_capacity(applications.len());
    for application in applications {
        let candidate = state
            .repos
            .profiles
            .candidate_by_id(application.candidate_id)
            .await?;
        applicants.push(Applicant {
            application,
            candidate,
        });
    }
    Ok(ApiResponse::ok(applicants))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_website_normalization() {
        assert_eq!(normalize_website("  ").unwrap(), None);
        assert_eq!(
            normalize_website("https://hospital.example.org").unwrap().as_deref(),
            Some("https://hospital.example.org/")
        );
        assert!(normalize_website("javascript:alert(1)").is_err());
        assert!(normalize_website("ftp://files.example.org").is_err());
        assert!(normalize_website("not a url").is_err());
    }
}
