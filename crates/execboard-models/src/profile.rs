//! Candidate and employer profiles linked to user accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which linked profile a route requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    Candidate,
    Employer,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Candidate => "candidate",
            ProfileKind::Employer => "employer",
        }
    }
}

/// Candidate (job seeker) profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years_experience: Option<i32>,
    #[serde(default)]
    pub specialties: Vec<String>,
    /// Blob storage key of the current resume
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CandidateProfile {
    /// Empty profile created at registration.
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            headline: None,
            summary: None,
            location: None,
            years_experience: None,
            specialties: Vec::new(),
            resume_key: None,
            resume_file_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_resume(&self) -> bool {
        self.resume_key.is_some()
    }
}

/// Employer (hiring organization) profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployerProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_name: String,
    /// e.g. "Health System", "Hospital", "Physician Group"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Set by an admin once the organization is confirmed
    #[serde(default)]
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmployerProfile {
    pub fn new(user_id: Uuid, company_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            company_name: company_name.into(),
            organization_type: None,
            website: None,
            description: None,
            location: None,
            verified: false,
            created_at: now,
            updated_at: now,
        }
    }
}
