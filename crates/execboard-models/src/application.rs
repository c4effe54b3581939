//! Job applications.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseEnumError;

/// Application pipeline status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    #[default]
    Submitted,
    Reviewed,
    Shortlisted,
    Interviewing,
    Offered,
    Hired,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "SUBMITTED",
            ApplicationStatus::Reviewed => "REVIEWED",
            ApplicationStatus::Shortlisted => "SHORTLISTED",
            ApplicationStatus::Interviewing => "INTERVIEWING",
            ApplicationStatus::Offered => "OFFERED",
            ApplicationStatus::Hired => "HIRED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::Withdrawn => "WITHDRAWN",
        }
    }

    /// No further changes once hired, rejected or withdrawn.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Hired | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }

    /// Statuses an employer may set. Submitted and Withdrawn belong to the candidate.
    pub fn is_employer_settable(&self) -> bool {
        !matches!(self, ApplicationStatus::Submitted | ApplicationStatus::Withdrawn)
    }

    /// Whether an employer may move an application from `self` to `next`.
    pub fn can_employer_transition_to(&self, next: ApplicationStatus) -> bool {
        !self.is_terminal() && next.is_employer_settable() && *self != next
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SUBMITTED" => Ok(ApplicationStatus::Submitted),
            "REVIEWED" => Ok(ApplicationStatus::Reviewed),
            "SHORTLISTED" => Ok(ApplicationStatus::Shortlisted),
            "INTERVIEWING" => Ok(ApplicationStatus::Interviewing),
            "OFFERED" => Ok(ApplicationStatus::Offered),
            "HIRED" => Ok(ApplicationStatus::Hired),
            "REJECTED" => Ok(ApplicationStatus::Rejected),
            "WITHDRAWN" => Ok(ApplicationStatus::Withdrawn),
            _ => Err(ParseEnumError::new("application status", s)),
        }
    }
}

/// A candidate's application to a job. Unique per (job, candidate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub job_id: Uuid,
    pub candidate_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_letter: Option<String>,
    #[serde(default)]
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn new(job_id: Uuid, candidate_id: Uuid, cover_letter: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            job_id,
            candidate_id,
            cover_letter,
            status: ApplicationStatus::Submitted,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_employer_transitions() {
        use ApplicationStatus::*;

        assert!(Submitted.can_employer_transition_to(Reviewed));
        assert!(Reviewed.can_employer_transition_to(Rejected));
        assert!(Interviewing.can_employer_transition_to(Offered));
        assert!(!Submitted.can_employer_transition_to(Withdrawn));
        assert!(!Reviewed.can_employer_transition_to(Submitted));
        assert!(!Hired.can_employer_transition_to(Rejected));
        assert!(!Withdrawn.can_employer_transition_to(Reviewed));
        assert!(!Reviewed.can_employer_transition_to(Reviewed));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            "shortlisted".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::Shortlisted
        );
        assert!("pending".parse::<ApplicationStatus>().is_err());
    }
}
