use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use execboard_models::{Application, ApplicationStatus};

use super::rows::{convert_all, ApplicationRow};
use super::{to_count, PgStore};
use crate::error::{DbError, DbResult};
use crate::repos::ApplicationRepository;

const APPLICATION_COLUMNS: &str =
    "id, job_id, candidate_id, cover_letter, status, created_at, updated_at";

#[async_trait]
impl ApplicationRepository for PgStore {
    async fn insert(&self, application: &Application) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO applications (id, job_id, candidate_id, cover_letter, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(application.id)
        .bind(application.job_id)
        .bind(application.candidate_id)
        .bind(&application.cover_letter)
        .bind(application.status.as_str())
        .bind(application.created_at)
        .bind(application.updated_at)
        .execute(self.pool())
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Conflict(_) => DbError::conflict("already applied to this job"),
            other => other,
        })?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> DbResult<Option<Application>> {
        let row: Option<ApplicationRow> = sqlx::query_as(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        row.map(Application::try_from).transpose()
    }

    async fn list_by_candidate(&self, candidate_id: Uuid) -> DbResult<Vec<Application>> {
        let rows: Vec<ApplicationRow> = sqlx::query_as(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications
             WHERE candidate_id = $1 ORDER BY created_at DESC"
        ))
        .bind(candidate_id)
        .fetch_all(self.pool())
        .await?;
        convert_all(rows)
    }

    async fn list_by_job(&self, job_id: Uuid) -> DbResult<Vec<Application>> {
        let rows: Vec<ApplicationRow> = sqlx::query_as(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications
             WHERE job_id = $1 ORDER BY created_at DESC"
        ))
        .bind(job_id)
        .fetch_all(self.pool())
        .await?;
        convert_all(rows)
    }

    async fn set_status(
        &self,
        id: Uuid,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> DbResult<Option<Application>> {
        let row: Option<ApplicationRow> = sqlx::query_as(&format!(
            "UPDATE applications SET status = $3, updated_at = $4
             WHERE id = $1 AND status = $2
             RETURNING {APPLICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(Utc::now())
        .fetch_optional(self.pool())
        .await?;
        row.map(Application::try_from).transpose()
    }

    async fn count(&self) -> DbResult<u64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM applications")
            .fetch_one(self.pool())
            .await?;
        Ok(to_count(n))
    }
}
