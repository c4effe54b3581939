//! Repository traits.
//!
//! Handlers only see these traits. `PgStore` implements them over Postgres,
//! `MemoryStore` over process-local maps for tests and local development.
//! Status changes are compare-and-set: they take the expected current status
//! and return `None` when the row was not in that status.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use execboard_models::{
    AccountStatus, Application, ApplicationStatus, CandidateProfile, EmployerProfile, Job,
    JobFilter, JobStatus, Message, Notification, Page, PageRequest, Payment, Role, Subscription,
    User,
};

use crate::error::DbResult;
use crate::memory::MemoryStore;
use crate::postgres::PgStore;

/// Profile created together with its user.
#[derive(Debug, Clone)]
pub enum LinkedProfile {
    Candidate(CandidateProfile),
    Employer(EmployerProfile),
    None,
}

/// Fields written alongside a job status transition.
#[derive(Debug, Clone)]
pub struct JobTransition {
    pub from: JobStatus,
    pub to: JobStatus,
    /// Always written; `None` clears a previous reason
    pub rejection_reason: Option<String>,
    /// Written only when set
    pub published_at: Option<DateTime<Utc>>,
    /// Written only when set
    pub expires_at: Option<DateTime<Utc>>,
}

impl JobTransition {
    pub fn new(from: JobStatus, to: JobStatus) -> Self {
        Self {
            from,
            to,
            rejection_reason: None,
            published_at: None,
            expires_at: None,
        }
    }

    pub fn with_rejection_reason(mut self, reason: impl Into<String>) -> Self {
        self.rejection_reason = Some(reason.into());
        self
    }

    pub fn with_listing_window(mut self, published_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self.expires_at = Some(expires_at);
        self
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user and its linked profile atomically. Duplicate email is a conflict.
    async fn create(&self, user: &User, profile: &LinkedProfile) -> DbResult<()>;
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> DbResult<Option<User>>;
    async fn list(
        &self,
        role: Option<Role>,
        status: Option<AccountStatus>,
        page: PageRequest,
    ) -> DbResult<Page<User>>;
    async fn ids_by_role(&self, role: Role) -> DbResult<Vec<Uuid>>;
    async fn set_status(&self, id: Uuid, status: AccountStatus) -> DbResult<Option<User>>;
    async fn count_by_role(&self) -> DbResult<Vec<(Role, u64)>>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn candidate_by_id(&self, id: Uuid) -> DbResult<Option<CandidateProfile>>;
    async fn candidate_by_user(&self, user_id: Uuid) -> DbResult<Option<CandidateProfile>>;
    async fn update_candidate(&self, profile: &CandidateProfile) -> DbResult<()>;
    async fn employer_by_id(&self, id: Uuid) -> DbResult<Option<EmployerProfile>>;
    async fn employer_by_user(&self, user_id: Uuid) -> DbResult<Option<EmployerProfile>>;
    async fn update_employer(&self, profile: &EmployerProfile) -> DbResult<()>;
    async fn set_employer_verified(&self, id: Uuid, verified: bool) -> DbResult<Option<EmployerProfile>>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn insert(&self, job: &Job) -> DbResult<()>;
    async fn find(&self, id: Uuid) -> DbResult<Option<Job>>;
    /// Overwrite descriptive fields. Status is left untouched.
    async fn update_content(&self, job: &Job) -> DbResult<()>;
    async fn transition(&self, id: Uuid, transition: &JobTransition) -> DbResult<Option<Job>>;
    /// Delete only while the job is in `expected`.
    async fn delete(&self, id: Uuid, expected: JobStatus) -> DbResult<bool>;
    async fn list_public(
        &self,
        filter: &JobFilter,
        page: PageRequest,
        now: DateTime<Utc>,
    ) -> DbResult<Page<Job>>;
    async fn list_by_employer(&self, employer_id: Uuid) -> DbResult<Vec<Job>>;
    async fn list_by_status(&self, status: JobStatus, page: PageRequest) -> DbResult<Page<Job>>;
    async fn count_by_status(&self) -> DbResult<Vec<(JobStatus, u64)>>;
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// A second application for the same (job, candidate) is a conflict.
    async fn insert(&self, application: &Application) -> DbResult<()>;
    async fn find(&self, id: Uuid) -> DbResult<Option<Application>>;
    async fn list_by_candidate(&self, candidate_id: Uuid) -> DbResult<Vec<Application>>;
    async fn list_by_job(&self, job_id: Uuid) -> DbResult<Vec<Application>>;
    async fn set_status(
        &self,
        id: Uuid,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> DbResult<Option<Application>>;
    async fn count(&self) -> DbResult<u64>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, message: &Message) -> DbResult<()>;
    /// Messages sent or received by `user_id`, newest first.
    async fn list_for_user(&self, user_id: Uuid, page: PageRequest) -> DbResult<Page<Message>>;
    async fn unread_count(&self, recipient_id: Uuid) -> DbResult<u64>;
    /// Mark read if `recipient_id` is the recipient. Already-read messages are returned unchanged.
    async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> DbResult<Option<Message>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: &Notification) -> DbResult<()>;
    async fn list(&self, user_id: Uuid, unread_only: bool, limit: u32) -> DbResult<Vec<Notification>>;
    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> DbResult<bool>;
    async fn mark_all_read(&self, user_id: Uuid) -> DbResult<u64>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert(&self, payment: &Payment) -> DbResult<()>;
    async fn find_by_session(&self, checkout_session_id: &str) -> DbResult<Option<Payment>>;
    /// Mark a payment paid. Returns `None` if it was already paid or does not exist.
    async fn mark_paid(
        &self,
        checkout_session_id: &str,
        payment_intent_id: Option<&str>,
        paid_at: DateTime<Utc>,
    ) -> DbResult<Option<Payment>>;
    /// Mark a pending payment failed. Paid payments are never downgraded.
    async fn mark_failed(&self, checkout_session_id: &str) -> DbResult<bool>;
    async fn list_by_employer(&self, employer_id: Uuid) -> DbResult<Vec<Payment>>;
    async fn total_paid_cents(&self) -> DbResult<i64>;
    /// Insert or replace the employer's subscription.
    async fn upsert_subscription(&self, subscription: &Subscription) -> DbResult<Subscription>;
    async fn subscription_for_employer(&self, employer_id: Uuid) -> DbResult<Option<Subscription>>;
    async fn subscription_by_provider_id(&self, provider_id: &str) -> DbResult<Option<Subscription>>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> DbResult<()>;
}

/// All repositories behind shared trait objects.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub applications: Arc<dyn ApplicationRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub health: Arc<dyn StoreHealth>,
}

impl Repositories {
    /// Repositories backed by a Postgres pool.
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self::from_store(Arc::new(PgStore::new(pool)))
    }

    /// Repositories backed by process-local maps.
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::new()))
    }

    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserRepository
            + ProfileRepository
            + JobRepository
            + ApplicationRepository
            + MessageRepository
            + NotificationRepository
            + PaymentRepository
            + StoreHealth
            + 'static,
    {
        Self {
            users: store.clone(),
            profiles: store.clone(),
            jobs: store.clone(),
            applications: store.clone(),
            messages: store.clone(),
            notifications: store.clone(),
            payments: store.clone(),
            health: store,
        }
    }
}
