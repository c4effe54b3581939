//! In-app notifications.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseEnumError;

/// What triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    JobSubmitted,
    JobApproved,
    JobRejected,
    PaymentReceived,
    ApplicationReceived,
    ApplicationStatusChanged,
    NewMessage,
    AccountStatusChanged,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::JobSubmitted => "JOB_SUBMITTED",
            NotificationKind::JobApproved => "JOB_APPROVED",
            NotificationKind::JobRejected => "JOB_REJECTED",
            NotificationKind::PaymentReceived => "PAYMENT_RECEIVED",
            NotificationKind::ApplicationReceived => "APPLICATION_RECEIVED",
            NotificationKind::ApplicationStatusChanged => "APPLICATION_STATUS_CHANGED",
            NotificationKind::NewMessage => "NEW_MESSAGE",
            NotificationKind::AccountStatusChanged => "ACCOUNT_STATUS_CHANGED",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "JOB_SUBMITTED" => Ok(NotificationKind::JobSubmitted),
            "JOB_APPROVED" => Ok(NotificationKind::JobApproved),
            "JOB_REJECTED" => Ok(NotificationKind::JobRejected),
            "PAYMENT_RECEIVED" => Ok(NotificationKind::PaymentReceived),
            "APPLICATION_RECEIVED" => Ok(NotificationKind::ApplicationReceived),
            "APPLICATION_STATUS_CHANGED" => Ok(NotificationKind::ApplicationStatusChanged),
            "NEW_MESSAGE" => Ok(NotificationKind::NewMessage),
            "ACCOUNT_STATUS_CHANGED" => Ok(NotificationKind::AccountStatusChanged),
            _ => Err(ParseEnumError::new("notification kind", s)),
        }
    }
}

/// Notification shown to a single user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    /// Client-side route the notification points at
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            title: title.into(),
            body: body.into(),
            link: None,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}
