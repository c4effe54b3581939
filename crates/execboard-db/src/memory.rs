//! Process-local repository implementation.
//!
//! Everything lives behind one `RwLock`, so multi-table writes (user plus
//! profile) and compare-and-set transitions are atomic the same way the
//! Postgres statements are.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use execboard_models::{
    AccountStatus, Application, ApplicationStatus, CandidateProfile, EmployerProfile, Job,
    JobFilter, JobStatus, Message, Notification, Page, PageRequest, Payment, PaymentStatus, Role,
    Subscription, User,
};

use crate::error::{DbError, DbResult};
use crate::repos::{
    ApplicationRepository, JobRepository, JobTransition, LinkedProfile, MessageRepository,
    NotificationRepository, PaymentRepository, ProfileRepository, StoreHealth, UserRepository,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    candidates: HashMap<Uuid, CandidateProfile>,
    employers: HashMap<Uuid, EmployerProfile>,
    jobs: HashMap<Uuid, Job>,
    applications: HashMap<Uuid, Application>,
    messages: HashMap<Uuid, Message>,
    notifications: HashMap<Uuid, Notification>,
    payments: HashMap<Uuid, Payment>,
    subscriptions: HashMap<Uuid, Subscription>,
}

/// In-memory store used by tests and when no database is configured.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Slice `items` (already sorted) into the requested page.
fn paginate<T>(items: Vec<T>, page: PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    Page::new(items, total, page)
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: &User, profile: &LinkedProfile) -> DbResult<()> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(DbError::conflict(format!("user '{}' already exists", user.email)));
        }
        t.users.insert(user.id, user.clone());
        match profile {
            LinkedProfile::Candidate(p) => {
                t.candidates.insert(p.id, p.clone());
            }
            LinkedProfile::Employer(p) => {
                t.employers.insert(p.id, p.clone());
            }
            LinkedProfile::None => {}
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let email = email.to_lowercase();
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn list(
        &self,
        role: Option<Role>,
        status: Option<AccountStatus>,
        page: PageRequest,
    ) -> DbResult<Page<User>> {
        let t = self.tables.read().await;
        let mut users: Vec<User> = t
            .users
            .values()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .filter(|u| status.map_or(true, |s| u.status == s))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(users, page))
    }

    async fn ids_by_role(&self, role: Role) -> DbResult<Vec<Uuid>> {
        let t = self.tables.read().await;
        Ok(t.users
            .values()
            .filter(|u| u.role == role && u.is_active())
            .map(|u| u.id)
            .collect())
    }

    async fn set_status(&self, id: Uuid, status: AccountStatus) -> DbResult<Option<User>> {
        let mut t = self.tables.write().await;
        Ok(t.users.get_mut(&id).map(|u| {
            u.status = status;
            u.updated_at = Utc::now();
            u.clone()
        }))
    }

    async fn count_by_role(&self) -> DbResult<Vec<(Role, u64)>> {
        let t = self.tables.read().await;
        let mut counts: HashMap<Role, u64> = HashMap::new();
        for user in t.users.values() {
            *counts.entry(user.role).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn candidate_by_id(&self, id: Uuid) -> DbResult<Option<CandidateProfile>> {
        Ok(self.tables.read().await.candidates.get(&id).cloned())
    }

    async fn candidate_by_user(&self, user_id: Uuid) -> DbResult<Option<CandidateProfile>> {
        let t = self.tables.read().await;
        Ok(t.candidates.values().find(|p| p.user_id == user_id).cloned())
    }

    async fn update_candidate(&self, profile: &CandidateProfile) -> DbResult<()> {
        let mut t = self.tables.write().await;
        let existing = t
            .candidates
            .get_mut(&profile.id)
            .ok_or_else(|| DbError::not_found(format!("candidate profile {}", profile.id)))?;
        *existing = CandidateProfile {
            created_at: existing.created_at,
            updated_at: Utc::now(),
            ..profile.clone()
        };
        Ok(())
    }

    async fn employer_by_id(&self, id: Uuid) -> DbResult<Option<EmployerProfile>> {
        Ok(self.tables.read().await.employers.get(&id).cloned())
    }

    async fn employer_by_user(&self, user_id: Uuid) -> DbResult<Option<EmployerProfile>> {
        let t = self.tables.read().await;
        Ok(t.employers.values().find(|p| p.user_id == user_id).cloned())
    }

    async fn update_employer(&self, profile: &EmployerProfile) -> DbResult<()> {
        let mut t = self.tables.write().await;
        let existing = t
            .employers
            .get_mut(&profile.id)
            .ok_or_else(|| DbError::not_found(format!("employer profile {}", profile.id)))?;
        *existing = EmployerProfile {
            verified: existing.verified,
            created_at: existing.created_at,
            updated_at: Utc::now(),
            ..profile.clone()
        };
        Ok(())
    }

    async fn set_employer_verified(
        &self,
        id: Uuid,
        verified: bool,
    ) -> DbResult<Option<EmployerProfile>> {
        let mut t = self.tables.write().await;
        Ok(t.employers.get_mut(&id).map(|p| {
            p.verified = verified;
            p.updated_at = Utc::now();
            p.clone()
        }))
    }
}

#[async_trait]
impl JobRepository for MemoryStore {
    async fn insert(&self, job: &Job) -> DbResult<()> {
        let mut t = self.tables.write().await;
        if t.jobs.contains_key(&job.id) {
            return Err(DbError::conflict(format!("job {}", job.id)));
        }
        t.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> DbResult<Option<Job>> {
        Ok(self.tables.read().await.jobs.get(&id).cloned())
    }

    async fn update_content(&self, job: &Job) -> DbResult<()> {
        let mut t = self.tables.write().await;
        let existing = t
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| DbError::not_found(format!("job {}", job.id)))?;
        existing.title = job.title.clone();
        existing.description = job.description.clone();
        existing.location = job.location.clone();
        existing.remote = job.remote;
        existing.employment_type = job.employment_type;
        existing.specialty = job.specialty.clone();
        existing.salary_min = job.salary_min;
        existing.salary_max = job.salary_max;
        existing.updated_at = Utc::now();
        Ok(())
    }

    async fn transition(&self, id: Uuid, transition: &JobTransition) -> DbResult<Option<Job>> {
        let mut t = self.tables.write().await;
        let Some(job) = t.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if job.status != transition.from {
            return Ok(None);
        }
        job.status = transition.to;
        job.rejection_reason = transition.rejection_reason.clone();
        if let Some(published_at) = transition.published_at {
            job.published_at = Some(published_at);
        }
        if let Some(expires_at) = transition.expires_at {
            job.expires_at = Some(expires_at);
        }
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn delete(&self, id: Uuid, expected: JobStatus) -> DbResult<bool> {
        let mut t = self.tables.write().await;
        if !t.jobs.get(&id).is_some_and(|job| job.status == expected) {
            return Ok(false);
        }
        t.jobs.remove(&id);
        t.applications.retain(|_, a| a.job_id != id);
        Ok(true)
    }

    async fn list_public(
        &self,
        filter: &JobFilter,
        page: PageRequest,
        now: DateTime<Utc>,
    ) -> DbResult<Page<Job>> {
        let t = self.tables.read().await;
        let mut jobs: Vec<Job> = t
            .jobs
            .values()
            .filter(|j| j.is_publicly_visible(now) && filter.matches(j))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(paginate(jobs, page))
    }

    async fn list_by_employer(&self, employer_id: Uuid) -> DbResult<Vec<Job>> {
        let t = self.tables.read().await;
        let mut jobs: Vec<Job> = t
            .jobs
            .values()
            .filter(|j| j.employer_id == employer_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn list_by_status(&self, status: JobStatus, page: PageRequest) -> DbResult<Page<Job>> {
        let t = self.tables.read().await;
        let mut jobs: Vec<Job> = t.jobs.values().filter(|j| j.status == status).cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(paginate(jobs, page))
    }

    async fn count_by_status(&self) -> DbResult<Vec<(JobStatus, u64)>> {
        let t = self.tables.read().await;
        let mut counts: HashMap<JobStatus, u64> = HashMap::new();
        for job in t.jobs.values() {
            *counts.entry(job.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[async_trait]
impl ApplicationRepository for MemoryStore {
    async fn insert(&self, application: &Application) -> DbResult<()> {
        let mut t = self.tables.write().await;
        let duplicate = t.applications.values().any(|a| {
            a.job_id == application.job_id && a.candidate_id == application.candidate_id
        });
        if duplicate {
            return Err(DbError::conflict("already applied to this job"));
        }
        t.applications.insert(application.id, application.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> DbResult<Option<Application>> {
        Ok(self.tables.read().await.applications.get(&id).cloned())
    }

    async fn list_by_candidate(&self, candidate_id: Uuid) -> DbResult<Vec<Application>> {
        let t = self.tables.read().await;
        let mut apps: Vec<Application> = t
            .applications
            .values()
            .filter(|a| a.candidate_id == candidate_id)
            .cloned()
            .collect();
        apps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apps)
    }

    async fn list_by_job(&self, job_id: Uuid) -> DbResult<Vec<Application>> {
        let t = self.tables.read().await;
        let mut apps: Vec<Application> = t
            .applications
            .values()
            .filter(|a| a.job_id == job_id)
            .cloned()
            .collect();
        apps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apps)
    }

    async fn set_status(
        &self,
        id: Uuid,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> DbResult<Option<Application>> {
        let mut t = self.tables.write().await;
        match t.applications.get_mut(&id) {
            Some(app) if app.status == from => {
                app.status = to;
                app.updated_at = Utc::now();
                Ok(Some(app.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn count(&self) -> DbResult<u64> {
        Ok(self.tables.read().await.applications.len() as u64)
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn insert(&self, message: &Message) -> DbResult<()> {
        let mut t = self.tables.write().await;
        t.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid, page: PageRequest) -> DbResult<Page<Message>> {
        let t = self.tables.read().await;
        let mut messages: Vec<Message> = t
            .messages
            .values()
            .filter(|m| m.sender_id == user_id || m.recipient_id == user_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(messages, page))
    }

    async fn unread_count(&self, recipient_id: Uuid) -> DbResult<u64> {
        let t = self.tables.read().await;
        Ok(t.messages
            .values()
            .filter(|m| m.recipient_id == recipient_id && !m.is_read())
            .count() as u64)
    }

    async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> DbResult<Option<Message>> {
        let mut t = self.tables.write().await;
        match t.messages.get_mut(&id) {
            Some(m) if m.recipient_id == recipient_id => {
                if m.read_at.is_none() {
                    m.read_at = Some(Utc::now());
                }
                Ok(Some(m.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert(&self, notification: &Notification) -> DbResult<()> {
        let mut t = self.tables.write().await;
        t.notifications.insert(notification.id, notification.clone());
        Ok(())
    }

    async fn list(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: u32,
    ) -> DbResult<Vec<Notification>> {
        let t = self.tables.read().await;
        let mut items: Vec<Notification> = t
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && (!unread_only || n.read_at.is_none()))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit as usize);
        Ok(items)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> DbResult<bool> {
        let mut t = self.tables.write().await;
        match t.notifications.get_mut(&id) {
            Some(n) if n.user_id == user_id => {
                n.read_at.get_or_insert_with(Utc::now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: Uuid) -> DbResult<u64> {
        let mut t = self.tables.write().await;
        let now = Utc::now();
        let mut updated = 0;
        for n in t.notifications.values_mut() {
            if n.user_id == user_id && n.read_at.is_none() {
                n.read_at = Some(now);
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn insert(&self, payment: &Payment) -> DbResult<()> {
        let mut t = self.tables.write().await;
        if t
            .payments
            .values()
            .any(|p| p.checkout_session_id == payment.checkout_session_id)
        {
            return Err(DbError::conflict(format!(
                "checkout session {}",
                payment.checkout_session_id
            )));
        }
        t.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn find_by_session(&self, checkout_session_id: &str) -> DbResult<Option<Payment>> {
        let t = self.tables.read().await;
        Ok(t.payments
            .values()
            .find(|p| p.checkout_session_id == checkout_session_id)
            .cloned())
    }

    async fn mark_paid(
        &self,
        checkout_session_id: &str,
        payment_intent_id: Option<&str>,
        paid_at: DateTime<Utc>,
    ) -> DbResult<Option<Payment>> {
        let mut t = self.tables.write().await;
        let payment = t
            .payments
            .values_mut()
            .find(|p| p.checkout_session_id == checkout_session_id);
        match payment {
            Some(p) if p.status != PaymentStatus::Paid => {
                p.status = PaymentStatus::Paid;
                if let Some(intent) = payment_intent_id {
                    p.payment_intent_id = Some(intent.to_string());
                }
                p.paid_at = Some(paid_at);
                Ok(Some(p.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_failed(&self, checkout_session_id: &str) -> DbResult<bool> {
        let mut t = self.tables.write().await;
        let payment = t
            .payments
            .values_mut()
            .find(|p| p.checkout_session_id == checkout_session_id);
        match payment {
            Some(p) if p.status == PaymentStatus::Pending => {
                p.status = PaymentStatus::Failed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_by_employer(&self, employer_id: Uuid) -> DbResult<Vec<Payment>> {
        let t = self.tables.read().await;
        let mut payments: Vec<Payment> = t
            .payments
            .values()
            .filter(|p| p.employer_id == employer_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    async fn total_paid_cents(&self) -> DbResult<i64> {
        let t = self.tables.read().await;
        Ok(t.payments
            .values()
            .filter(|p| p.status == PaymentStatus::Paid)
            .map(|p| p.amount_cents)
            .sum())
    }

    async fn upsert_subscription(&self, subscription: &Subscription) -> DbResult<Subscription> {
        let mut t = self.tables.write().await;
        let taken = t.subscriptions.values().any(|s| {
            s.provider_subscription_id == subscription.provider_subscription_id
                && s.employer_id != subscription.employer_id
        });
        if taken {
            return Err(DbError::conflict(format!(
                "subscription {} belongs to another employer",
                subscription.provider_subscription_id
            )));
        }

        let now = Utc::now();
        let existing = t
            .subscriptions
            .values()
            .find(|s| s.employer_id == subscription.employer_id)
            .cloned();
        let stored = match existing {
            Some(prev) => Subscription {
                id: prev.id,
                provider_customer_id: subscription
                    .provider_customer_id
                    .clone()
                    .or(prev.provider_customer_id),
                created_at: prev.created_at,
                updated_at: now,
                ..subscription.clone()
            },
            None => Subscription {
                updated_at: now,
                ..subscription.clone()
            },
        };
        t.subscriptions.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn subscription_for_employer(&self, employer_id: Uuid) -> DbResult<Option<Subscription>> {
        let t = self.tables.read().await;
        Ok(t.subscriptions
            .values()
            .find(|s| s.employer_id == employer_id)
            .cloned())
    }

    async fn subscription_by_provider_id(&self, provider_id: &str) -> DbResult<Option<Subscription>> {
        let t = self.tables.read().await;
        Ok(t.subscriptions
            .values()
            .find(|s| s.provider_subscription_id == provider_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use execboard_models::{SubscriptionPlan, SubscriptionStatus};

    // ============================================================================
    // Helpers
    // ============================================================================

    async fn seed_employer(store: &MemoryStore) -> EmployerProfile {
        let user = User::new("hr@mercy.org", "hash", "Mercy HR", Role::Employer);
        let profile = EmployerProfile::new(user.id, "Mercy Health");
        store
            .create(&user, &LinkedProfile::Employer(profile.clone()))
            .await
            .unwrap();
        profile
    }

    async fn seed_job(store: &MemoryStore, employer_id: Uuid, status: JobStatus) -> Job {
        let job = Job::new(employer_id, "Chief Medical Officer", "Lead clinical strategy", "Denver, CO", status);
        JobRepository::insert(store, &job).await.unwrap();
        job
    }

    // ============================================================================
    // Users
    // ============================================================================

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = MemoryStore::new();
        seed_employer(&store).await;

        let dup = User::new("HR@mercy.org", "hash", "Other", Role::Candidate);
        let err = store.create(&dup, &LinkedProfile::None).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_find_by_email_is_case_insensitive() {
        let store = MemoryStore::new();
        seed_employer(&store).await;
        assert!(store.find_by_email("HR@Mercy.org").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_suspended_users_excluded_from_role_fanout() {
        let store = MemoryStore::new();
        let admin = User::new("admin@execboard.io", "hash", "Admin", Role::Admin);
        store.create(&admin, &LinkedProfile::None).await.unwrap();
        assert_eq!(store.ids_by_role(Role::Admin).await.unwrap(), vec![admin.id]);

        UserRepository::set_status(&store, admin.id, AccountStatus::Suspended)
            .await
            .unwrap();
        assert!(store.ids_by_role(Role::Admin).await.unwrap().is_empty());
    }

    // ============================================================================
    // Jobs
    // ============================================================================

    #[tokio::test]
    async fn test_job_transition_applies_once() {
        let store = MemoryStore::new();
        let employer = seed_employer(&store).await;
        let job = seed_job(&store, employer.id, JobStatus::PendingAdminReview).await;

        let (published, expires) = Job::listing_window(Utc::now());
        let approve = JobTransition::new(JobStatus::PendingAdminReview, JobStatus::Live)
            .with_listing_window(published, expires);

        let first = store.transition(job.id, &approve).await.unwrap();
        let second = store.transition(job.id, &approve).await.unwrap();

        let live = first.expect("first approval applies");
        assert_eq!(live.status, JobStatus::Live);
        assert_eq!(live.expires_at, Some(expires));
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_rejection_reason_cleared_on_resubmit() {
        let store = MemoryStore::new();
        let employer = seed_employer(&store).await;
        let job = seed_job(&store, employer.id, JobStatus::PendingAdminReview).await;

        let reject = JobTransition::new(JobStatus::PendingAdminReview, JobStatus::Rejected)
            .with_rejection_reason("Salary range missing");
        let rejected = store.transition(job.id, &reject).await.unwrap().unwrap();
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Salary range missing"));

        let resubmit = JobTransition::new(JobStatus::Rejected, JobStatus::PendingAdminReview);
        let pending = store.transition(job.id, &resubmit).await.unwrap().unwrap();
        assert!(pending.rejection_reason.is_none());
    }

    #[tokio::test]
    async fn test_delete_requires_expected_status() {
        let store = MemoryStore::new();
        let employer = seed_employer(&store).await;
        let live = seed_job(&store, employer.id, JobStatus::Live).await;
        let draft = seed_job(&store, employer.id, JobStatus::PendingPayment).await;

        assert!(!store.delete(live.id, JobStatus::PendingPayment).await.unwrap());
        assert!(store.delete(draft.id, JobStatus::PendingPayment).await.unwrap());
        assert!(JobRepository::find(&store, draft.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_public_listing_hides_expired_and_unapproved() {
        let store = MemoryStore::new();
        let employer = seed_employer(&store).await;
        let now = Utc::now();

        let visible = seed_job(&store, employer.id, JobStatus::Live).await;
        seed_job(&store, employer.id, JobStatus::PendingAdminReview).await;
        let mut expired = Job::new(employer.id, "CFO", "Finance", "Remote", JobStatus::Live);
        expired.expires_at = Some(now - Duration::days(1));
        JobRepository::insert(&store, &expired).await.unwrap();

        let page = store
            .list_public(&JobFilter::default(), PageRequest::default(), now)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, visible.id);
    }

    // ============================================================================
    // Applications
    // ============================================================================

    #[tokio::test]
    async fn test_duplicate_application_is_conflict() {
        let store = MemoryStore::new();
        let job_id = Uuid::new_v4();
        let candidate_id = Uuid::new_v4();

        ApplicationRepository::insert(&store, &Application::new(job_id, candidate_id, None))
            .await
            .unwrap();
        let err = ApplicationRepository::insert(&store, &Application::new(job_id, candidate_id, None))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_application_status_compare_and_set() {
        let store = MemoryStore::new();
        let app = Application::new(Uuid::new_v4(), Uuid::new_v4(), None);
        ApplicationRepository::insert(&store, &app).await.unwrap();

        let moved = ApplicationRepository::set_status(
            &store,
            app.id,
            ApplicationStatus::Submitted,
            ApplicationStatus::Reviewed,
        )
        .await
        .unwrap();
        assert_eq!(moved.unwrap().status, ApplicationStatus::Reviewed);

        let stale = ApplicationRepository::set_status(
            &store,
            app.id,
            ApplicationStatus::Submitted,
            ApplicationStatus::Withdrawn,
        )
        .await
        .unwrap();
        assert!(stale.is_none());
    }

    // ============================================================================
    // Messages and notifications
    // ============================================================================

    #[tokio::test]
    async fn test_only_recipient_marks_message_read() {
        let store = MemoryStore::new();
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let msg = Message::new(sender, recipient, None, None, "Are you available Tuesday?");
        MessageRepository::insert(&store, &msg).await.unwrap();

        assert_eq!(store.unread_count(recipient).await.unwrap(), 1);
        assert!(MessageRepository::mark_read(&store, msg.id, sender).await.unwrap().is_none());

        let read = MessageRepository::mark_read(&store, msg.id, recipient).await.unwrap().unwrap();
        assert!(read.is_read());
        assert_eq!(store.unread_count(recipient).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_notifications_unread_filter() {
        use execboard_models::NotificationKind;

        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        for i in 0..3 {
            let n = Notification::new(user, NotificationKind::NewMessage, format!("n{i}"), "body");
            NotificationRepository::insert(&store, &n).await.unwrap();
        }
        let all = NotificationRepository::list(&store, user, false, 10).await.unwrap();
        assert!(NotificationRepository::mark_read(&store, all[0].id, user).await.unwrap());
        assert_eq!(NotificationRepository::list(&store, user, true, 10).await.unwrap().len(), 2);
        assert_eq!(store.mark_all_read(user).await.unwrap(), 2);
        assert!(NotificationRepository::list(&store, user, true, 10).await.unwrap().is_empty());
    }

    // ============================================================================
    // Payments
    // ============================================================================

    #[tokio::test]
    async fn test_mark_paid_only_once() {
        let store = MemoryStore::new();
        let payment = Payment::new(Uuid::new_v4(), None, "cs_test_1", 49_900, "usd");
        PaymentRepository::insert(&store, &payment).await.unwrap();

        let first = store.mark_paid("cs_test_1", Some("pi_1"), Utc::now()).await.unwrap();
        let second = store.mark_paid("cs_test_1", Some("pi_1"), Utc::now()).await.unwrap();
        assert!(first.is_some());
        assert!(second.is_none());
        assert!(!store.mark_failed("cs_test_1").await.unwrap());
        assert_eq!(store.total_paid_cents().await.unwrap(), 49_900);
    }

    #[tokio::test]
    async fn test_upsert_subscription_replaces_per_employer() {
        let store = MemoryStore::new();
        let employer_id = Uuid::new_v4();
        let now = Utc::now();
        let sub = Subscription {
            id: Uuid::new_v4(),
            employer_id,
            provider_subscription_id: "sub_1".to_string(),
            provider_customer_id: Some("cus_1".to_string()),
            plan: SubscriptionPlan::Basic,
            status: SubscriptionStatus::Active,
            current_period_end: Some(now + Duration::days(30)),
            created_at: now,
            updated_at: now,
        };
        let first = store.upsert_subscription(&sub).await.unwrap();

        let update = Subscription {
            id: Uuid::new_v4(),
            provider_customer_id: None,
            status: SubscriptionStatus::Canceled,
            ..sub.clone()
        };
        let second = store.upsert_subscription(&update).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.status, SubscriptionStatus::Canceled);
        assert_eq!(second.provider_customer_id.as_deref(), Some("cus_1"));

        let other = Subscription {
            id: Uuid::new_v4(),
            employer_id: Uuid::new_v4(),
            ..sub
        };
        assert!(matches!(
            store.upsert_subscription(&other).await.unwrap_err(),
            DbError::Conflict(_)
        ));
    }
}
