//! Best-effort in-app notifications.
//!
//! Dispatch happens after the primary write succeeded. Failures are logged and
//! counted, never returned to the caller, never retried.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use execboard_db::{NotificationRepository, ProfileRepository, Repositories, UserRepository};
use execboard_models::{Notification, NotificationKind, Role};

use crate::metrics;

/// Notification content without a recipient.
#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
}

impl Notice {
    pub fn new(kind: NotificationKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: body.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    fn to(&self, user_id: Uuid) -> Notification {
        let notification = Notification::new(user_id, self.kind, self.title.clone(), self.body.clone());
        match &self.link {
            Some(link) => notification.with_link(link.clone()),
            None => notification,
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    notifications: Arc<dyn NotificationRepository>,
    users: Arc<dyn UserRepository>,
    profiles: Arc<dyn ProfileRepository>,
}

impl Notifier {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            notifications: Arc::clone(&repos.notifications),
            users: Arc::clone(&repos.users),
            profiles: Arc::clone(&repos.profiles),
        }
    }

    pub async fn notify_user(&self, user_id: Uuid, notice: &Notice) {
        match self.notifications.insert(&notice.to(user_id)).await {
            Ok(()) => debug!(user_id = %user_id, kind = %notice.kind, "Notification stored"),
            Err(e) => {
                warn!(user_id = %user_id, kind = %notice.kind, error = %e, "Failed to store notification");
                metrics::record_notification_failure(notice.kind.as_str());
            }
        }
    }

    /// Notify every active admin.
    pub async fn notify_admins(&self, notice: &Notice) {
        let admins = match self.users.ids_by_role(Role::Admin).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(kind = %notice.kind, error = %e, "Failed to load admins for notification");
                metrics::record_notification_failure(notice.kind.as_str());
                return;
            }
        };
        for admin_id in admins {
            self.notify_user(admin_id, notice).await;
        }
    }

    /// Notify the user behind an employer profile.
    pub async fn notify_employer(&self, employer_id: Uuid, notice: &Notice) {
        match self.profiles.employer_by_id(employer_id).await {
            Ok(Some(profile)) => self.notify_user(profile.user_id, notice).await,
            Ok(None) => warn!(employer_id = %employer_id, "Employer profile missing, notification dropped"),
            Err(e) => {
                warn!(employer_id = %employer_id, error = %e, "Failed to resolve employer for notification");
                metrics::record_notification_failure(notice.kind.as_str());
            }
        }
    }

    /// Notify the user behind a candidate profile.
    pub async fn notify_candidate(&self, candidate_id: Uuid, notice: &Notice) {
        match self.profiles.candidate_by_id(candidate_id).await {
            Ok(Some(profile)) => self.notify_user(profile.user_id, notice).await,
            Ok(None) => warn!(candidate_id = %candidate_id, "Candidate profile missing, notification dropped"),
            Err(e) => {
                warn!(candidate_id = %candidate_id, error = %e, "Failed to resolve candidate for notification");
                metrics::record_notification_failure(notice.kind.as_str());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use execboard_db::LinkedProfile;
    use execboard_models::{EmployerProfile, User};

    #[tokio::test]
    async fn test_admin_fanout_and_employer_lookup() {
        let repos = Repositories::in_memory();
        let admin = User::new("admin@example.org", "h", "Admin", Role::Admin);
        repos.users.create(&admin, &LinkedProfile::None).await.unwrap();

        let employer_user = User::new("hr@example.org", "h", "HR", Role::Employer);
        let profile = EmployerProfile::new(employer_user.id, "Mercy Health");
        repos
            .users
            .create(&employer_user, &LinkedProfile::Employer(profile.clone()))
            .await
            .unwrap();

        let notifier = Notifier::new(&repos);
        let notice = Notice::new(NotificationKind::JobSubmitted, "Job submitted", "Review it")
            .with_link("/admin/jobs");
        notifier.notify_admins(&notice).await;
        notifier.notify_employer(profile.id, &notice).await;
        notifier.notify_employer(Uuid::new_v4(), &notice).await;

        let admin_inbox = repos.notifications.list(admin.id, false, 10).await.unwrap();
        assert_eq!(admin_inbox.len(), 1);
        assert_eq!(admin_inbox[0].link.as_deref(), Some("/admin/jobs"));

        let employer_inbox = repos.notifications.list(employer_user.id, false, 10).await.unwrap();
        assert_eq!(employer_inbox.len(), 1);
    }
}
