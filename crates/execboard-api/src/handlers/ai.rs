//! AI assistance handlers.
//!
//! Each call is timed and recorded by operation and outcome. Model failures
//! surface as 503 so clients can retry.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use execboard_ai::{
    analyze_resume, draft_job_description, match_job, AiError, AiResult, JobDescriptionDraft,
    JobDescriptionInput, JobMatch, JobMatchInput, LanguageModel, ResumeAnalysis,
    ResumeAnalysisInput,
};
use execboard_models::CandidateProfile;

use crate::auth::{CandidateSession, EmployerSession};
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::response::ApiResponse;
use crate::security::{sanitize_optional, sanitize_plain_text, sanitize_tags, MAX_SHORT_TEXT_LENGTH};
use crate::state::AppState;
use crate::validation::ValidatedJson;

const MAX_RESUME_TEXT: usize = 50_000;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ResumeAnalysisRequest {
    /// Falls back to the caller's profile when absent
    #[validate(length(max = 50000, message = "Resume text must be at most 50000 characters"))]
    pub resume_text: Option<String>,
    #[validate(length(max = 200))]
    pub target_role: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct JobMatchRequest {
    pub job_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct JobDescriptionRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(length(max = 200))]
    pub specialty: Option<String>,
    #[validate(length(max = 20, message = "At most 20 requirements"))]
    #[serde(default)]
    pub key_requirements: Vec<String>,
}

fn model(state: &AppState) -> AiResult<Arc<dyn LanguageModel>> {
    state.ai.clone().ok_or(AiError::NotConfigured)
}

/// Run one AI operation and record its latency and outcome.
async fn timed<T, F>(operation: &'static str, call: F) -> AiResult<T>
where
    F: Future<Output = AiResult<T>>,
{
    let started = Instant::now();
    let result = call.await;
    let outcome = match &result {
        Ok(_) => "success",
        Err(e) => e.kind(),
    };
    metrics::record_ai_request(operation, outcome, started.elapsed().as_secs_f64());
    result
}

/// Plain-text rendering of a candidate profile for prompts.
fn profile_text(profile: &CandidateProfile) -> String {
    let mut lines = Vec::new();
    if let Some(headline) = &profile.headline {
        lines.push(format!("Headline: {headline}"));
    }
    if let Some(location) = &profile.location {
        lines.push(format!("Location: {location}"));
    }
    if let Some(years) = profile.years_experience {
        lines.push(format!("Years of experience: {years}"));
    }
    if !profile.specialties.is_empty() {
        lines.push(format!("Specialties: {}", profile.specialties.join(", ")));
    }
    if let Some(summary) = &profile.summary {
        lines.push(String::new());
        lines.push(summary.clone());
    }
    lines.join("\n")
}

async fn candidate_profile(state: &AppState, candidate_id: Uuid) -> ApiResult<CandidateProfile> {
    state
        .repos
        .profiles
        .candidate_by_id(candidate_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Candidate profile not found"))
}

pub async fn resume_analysis(
    State(state): State<AppState>,
    CandidateSession { candidate_id, .. }: CandidateSession,
    ValidatedJson(request): ValidatedJson<ResumeAnalysisRequest>,
) -> ApiResult<ApiResponse<ResumeAnalysis>> {
    let profile = candidate_profile(&state, candidate_id).await?;
    let model = model(&state)?;

    let resume_text = match request.resume_text.as_deref() {
        Some(text) => sanitize_plain_text(text, MAX_RESUME_TEXT),
        None => profile_text(&profile),
    };
    if resume_text.trim().is_empty() {
        return Err(ApiError::field(
            "resume_text",
            "Provide resume text or complete your profile first",
        ));
    }

    let input = ResumeAnalysisInput {
        resume_text,
        target_role: sanitize_optional(request.target_role.as_deref(), MAX_SHORT_TEXT_LENGTH),
    };
    let analysis = timed("resume_analysis", analyze_resume(model.as_ref(), &input)).await?;
    Ok(ApiResponse::ok(analysis))
}

pub async fn job_match(
    State(state): State<AppState>,
    CandidateSession { candidate_id, .. }: CandidateSession,
    ValidatedJson(request): ValidatedJson<JobMatchRequest>,
) -> ApiResult<ApiResponse<JobMatch>> {
    let profile = candidate_profile(&state, candidate_id).await?;
    let model = model(&state)?;

    let job = state
        .repos
        .jobs
        .find(request.job_id)
        .await?
        .filter(|job| job.is_publicly_visible(Utc::now()))
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    let candidate_profile = profile_text(&profile);
    if candidate_profile.trim().is_empty() {
        return Err(ApiError::bad_request(
            "Complete your profile before requesting a match",
        ));
    }

    let input = JobMatchInput {
        candidate_profile,
        job_title: job.title,
        job_description: job.description,
        job_location: Some(job.location),
    };
    let result = timed("job_match", match_job(model.as_ref(), &input)).await?;
    Ok(ApiResponse::ok(result))
}

pub async fn job_description(
    State(state): State<AppState>,
    EmployerSession { employer_id, .. }: EmployerSession,
    ValidatedJson(request): ValidatedJson<JobDescriptionRequest>,
) -> ApiResult<ApiResponse<JobDescriptionDraft>> {
    let model = model(&state)?;
    let employer = state
        .repos
        .profiles
        .employer_by_id(employer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Employer profile not found"))?;

    let title = sanitize_plain_text(&request.title, MAX_SHORT_TEXT_LENGTH);
    if title.is_empty() {
        return Err(ApiError::field("title", "Title is required"));
    }

    let input = JobDescriptionInput {
        title,
        organization: employer.company_name,
        location: sanitize_optional(request.location.as_deref(), MAX_SHORT_TEXT_LENGTH),
        specialty: sanitize_optional(request.specialty.as_deref(), MAX_SHORT_TEXT_LENGTH),
        key_requirements: sanitize_tags(&request.key_requirements, MAX_SHORT_TEXT_LENGTH),
    };
    let draft = timed("job_description", draft_job_description(model.as_ref(), &input)).await?;
    Ok(ApiResponse::ok(draft))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_text_skips_missing_fields() {
        let mut profile = CandidateProfile::new(Uuid::new_v4());
        assert!(profile_text(&profile).is_empty());

        profile.headline = Some("Chief Nursing Officer".to_string());
        profile.specialties = vec!["Critical care".to_string(), "Magnet".to_string()];
        let text = profile_text(&profile);
        assert!(text.contains("Headline: Chief Nursing Officer"));
        assert!(text.contains("Specialties: Critical care, Magnet"));
        assert!(!text.contains("Location"));
    }
}
