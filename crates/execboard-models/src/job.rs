//! Job postings and the admin-review workflow.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseEnumError;

/// Days a job stays listed after approval.
pub const JOB_LISTING_DAYS: i64 = 30;

/// Job posting status.
///
/// ```text
/// PENDING_PAYMENT -> PENDING_ADMIN_REVIEW -> LIVE -> CLOSED
///                                        \-> REJECTED -> PENDING_ADMIN_REVIEW
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Created, waiting for the posting fee
    #[default]
    PendingPayment,
    /// Paid (or covered by subscription), waiting for an admin
    PendingAdminReview,
    /// Publicly listed
    Live,
    /// Declined by an admin
    Rejected,
    /// Closed by the employer
    Closed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::PendingPayment => "PENDING_PAYMENT",
            JobStatus::PendingAdminReview => "PENDING_ADMIN_REVIEW",
            JobStatus::Live => "LIVE",
            JobStatus::Rejected => "REJECTED",
            JobStatus::Closed => "CLOSED",
        }
    }

    /// Employers may edit a posting only before it is reviewed or after rejection.
    pub fn is_editable(&self) -> bool {
        matches!(self, JobStatus::PendingPayment | JobStatus::Rejected)
    }

    pub fn is_deletable(&self) -> bool {
        matches!(self, JobStatus::PendingPayment)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING_PAYMENT" => Ok(JobStatus::PendingPayment),
            "PENDING_ADMIN_REVIEW" => Ok(JobStatus::PendingAdminReview),
            "LIVE" => Ok(JobStatus::Live),
            "REJECTED" => Ok(JobStatus::Rejected),
            "CLOSED" => Ok(JobStatus::Closed),
            _ => Err(ParseEnumError::new("job status", s)),
        }
    }
}

/// Employment arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmploymentType {
    #[default]
    FullTime,
    PartTime,
    Contract,
    Interim,
}

impl EmploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentType::FullTime => "FULL_TIME",
            EmploymentType::PartTime => "PART_TIME",
            EmploymentType::Contract => "CONTRACT",
            EmploymentType::Interim => "INTERIM",
        }
    }
}

impl fmt::Display for EmploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmploymentType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FULL_TIME" => Ok(EmploymentType::FullTime),
            "PART_TIME" => Ok(EmploymentType::PartTime),
            "CONTRACT" => Ok(EmploymentType::Contract),
            "INTERIM" => Ok(EmploymentType::Interim),
            _ => Err(ParseEnumError::new("employment type", s)),
        }
    }
}

/// Job posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// Owning employer profile
    pub employer_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub employment_type: EmploymentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_min: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_max: Option<i32>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new posting in the given initial status.
    pub fn new(
        employer_id: Uuid,
        title: impl Into<String>,
        description: impl Into<String>,
        location: impl Into<String>,
        status: JobStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            employer_id,
            title: title.into(),
            description: description.into(),
            location: location.into(),
            remote: false,
            employment_type: EmploymentType::default(),
            specialty: None,
            salary_min: None,
            salary_max: None,
            status,
            rejection_reason: None,
            published_at: None,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Publicly visible: live and not past its listing window.
    pub fn is_publicly_visible(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Live && self.expires_at.map_or(true, |exp| exp > now)
    }

    /// Listing window for an approval happening at `now`.
    pub fn listing_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (now, now + Duration::days(JOB_LISTING_DAYS))
    }
}

/// Public job search filter.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Free-text match against title and description
    pub query: Option<String>,
    pub location: Option<String>,
    pub specialty: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub remote: Option<bool>,
}

impl JobFilter {
    /// In-process evaluation of the filter (case-insensitive substring match).
    pub fn matches(&self, job: &Job) -> bool {
        fn contains(haystack: &str, needle: &str) -> bool {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        }

        if let Some(q) = &self.query {
            if !contains(&job.title, q) && !contains(&job.description, q) {
                return false;
            }
        }
        if let Some(loc) = &self.location {
            if !contains(&job.location, loc) {
                return false;
            }
        }
        if let Some(spec) = &self.specialty {
            match &job.specialty {
                Some(s) if contains(s, spec) => {}
                _ => return false,
            }
        }
        if let Some(et) = self.employment_type {
            if job.employment_type != et {
                return false;
            }
        }
        if let Some(remote) = self.remote {
            if job.remote != remote {
                return false;
            }
        }
        true
    }
}
