//! Resume upload handler.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use execboard_storage::resume_key;

use crate::auth::CandidateSession;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::response::ApiResponse;
use crate::security::sanitize_file_name;
use crate::services::{validate_resume, MAX_RESUME_BYTES};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadedResume {
    pub file_name: String,
    pub content_type: &'static str,
    pub size_bytes: usize,
}

struct ResumeFile {
    file_name: String,
    content_type: Option<String>,
    data: Vec<u8>,
}

/// Pull the `file` field, refusing to buffer more than the size limit.
async fn read_file_field(multipart: &mut Multipart) -> ApiResult<ResumeFile> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::field("file", "File name is required"))?;
        let content_type = field.content_type().map(str::to_string);

        let mut data = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?
        {
            if data.len() + chunk.len() > MAX_RESUME_BYTES {
                return Err(ApiError::field("file", "File exceeds the 5 MB limit"));
            }
            data.extend_from_slice(&chunk);
        }

        return Ok(ResumeFile {
            file_name,
            content_type,
            data,
        });
    }
    Err(ApiError::field("file", "No file was uploaded"))
}

/// Upload or replace the caller's resume.
pub async fn upload_resume(
    State(state): State<AppState>,
    CandidateSession { candidate_id, .. }: CandidateSession,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ApiResponse<UploadedResume>> {
    let storage = state
        .storage
        .clone()
        .ok_or_else(|| ApiError::unavailable("File storage is not configured"))?;
    let mut multipart =
        multipart.map_err(|e| ApiError::bad_request(format!("Expected a multipart upload: {e}")))?;

    let file = match read_file_field(&mut multipart).await {
        Ok(file) => file,
        Err(e) => {
            metrics::record_resume_upload("rejected");
            return Err(e);
        }
    };
    let format = match validate_resume(&file.file_name, file.content_type.as_deref(), &file.data) {
        Ok(format) => format,
        Err(e) => {
            metrics::record_resume_upload("rejected");
            return Err(e);
        }
    };

    let mut profile = state
        .repos
        .profiles
        .candidate_by_id(candidate_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Candidate profile not found"))?;

    let key = resume_key(candidate_id, format.extension())?;
    let size_bytes = file.data.len();
    if let Err(e) = storage.put(&key, file.data, format.content_type()).await {
        metrics::record_resume_upload("failed");
        return Err(e.into());
    }

    let previous = profile.resume_key.replace(key.clone());
    let file_name = sanitize_file_name(&file.file_name);
    profile.resume_file_name = Some(file_name.clone());
    profile.updated_at = Utc::now();
    if let Err(e) = state.repos.profiles.update_candidate(&profile).await {
        if let Err(cleanup) = storage.delete(&key).await {
            warn!(key = %key, error = %cleanup, "Failed to remove orphaned resume");
        }
        metrics::record_resume_upload("failed");
        return Err(e.into());
    }

    if let Some(old_key) = previous.filter(|old| *old != key) {
        if let Err(e) = storage.delete(&old_key).await {
            warn!(key = %old_key, error = %e, "Failed to delete previous resume");
        }
    }

    metrics::record_resume_upload("stored");
    info!(candidate_id = %candidate_id, key = %key, size_bytes, "Resume uploaded");

    Ok(ApiResponse::created(UploadedResume {
        file_name,
        content_type: format.content_type(),
        size_bytes,
    }))
}
