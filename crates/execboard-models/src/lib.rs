//! Shared domain models for the ExecBoard backend.
//!
//! This crate provides Serde-serializable types for:
//! - Users, roles and account status
//! - Candidate and employer profiles
//! - Job postings and their review workflow
//! - Applications, messages and notifications
//! - Payments and subscriptions

pub mod application;
pub mod error;
pub mod job;
pub mod message;
pub mod notification;
pub mod pagination;
pub mod payment;
pub mod profile;
pub mod user;

// Re-export common types
pub use application::{Application, ApplicationStatus};
pub use error::ParseEnumError;
pub use job::{EmploymentType, Job, JobFilter, JobStatus, JOB_LISTING_DAYS};
pub use message::Message;
pub use notification::{Notification, NotificationKind};
pub use pagination::{Page, PageRequest};
pub use payment::{Payment, PaymentStatus, Subscription, SubscriptionPlan, SubscriptionStatus};
pub use profile::{CandidateProfile, EmployerProfile, ProfileKind};
pub use user::{AccountStatus, Role, User};
