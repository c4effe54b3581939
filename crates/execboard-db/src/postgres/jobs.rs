use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use execboard_models::{Job, JobFilter, JobStatus, Page, PageRequest};

use super::rows::{convert_all, JobRow};
use super::{to_count, PgStore};
use crate::error::{DbError, DbResult};
use crate::repos::{JobRepository, JobTransition};

const JOB_COLUMNS: &str = "id, employer_id, title, description, location, remote, \
    employment_type, specialty, salary_min, salary_max, status, rejection_reason, \
    published_at, expires_at, created_at, updated_at";

/// Append the public-listing predicate for `filter` to `qb`.
fn push_public_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &JobFilter, now: DateTime<Utc>) {
    qb.push(" WHERE status = ")
        .push_bind(JobStatus::Live.as_str())
        .push(" AND (expires_at IS NULL OR expires_at > ")
        .push_bind(now)
        .push(")");

    if let Some(q) = &filter.query {
        let pattern = format!("%{}%", escape_like(q));
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(loc) = &filter.location {
        qb.push(" AND location ILIKE ")
            .push_bind(format!("%{}%", escape_like(loc)));
    }
    if let Some(spec) = &filter.specialty {
        qb.push(" AND specialty ILIKE ")
            .push_bind(format!("%{}%", escape_like(spec)));
    }
    if let Some(et) = filter.employment_type {
        qb.push(" AND employment_type = ").push_bind(et.as_str());
    }
    if let Some(remote) = filter.remote {
        qb.push(" AND remote = ").push_bind(remote);
    }
}

/// Escape LIKE wildcards so user input matches literally.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[async_trait]
impl JobRepository for PgStore {
    async fn insert(&self, job: &Job) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO jobs (id, employer_id, title, description, location, remote,
                employment_type, specialty, salary_min, salary_max, status, rejection_reason,
                published_at, expires_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(job.id)
        .bind(job.employer_id)
        .bind(&job.title)
        .bind(&job.description)
        .bind(&job.location)
        .bind(job.remote)
        .bind(job.employment_type.as_str())
        .bind(&job.specialty)
        .bind(job.salary_min)
        .bind(job.salary_max)
        .bind(job.status.as_str())
        .bind(&job.rejection_reason)
        .bind(job.published_at)
        .bind(job.expires_at)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> DbResult<Option<Job>> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool())
                .await?;
        row.map(Job::try_from).transpose()
    }

    async fn update_content(&self, job: &Job) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE jobs SET title = $2, description = $3, location = $4, remote = $5,
                employment_type = $6, specialty = $7, salary_min = $8, salary_max = $9,
                updated_at = $10
             WHERE id = $1",
        )
        .bind(job.id)
        .bind(&job.title)
        .bind(&job.description)
        .bind(&job.location)
        .bind(job.remote)
        .bind(job.employment_type.as_str())
        .bind(&job.specialty)
        .bind(job.salary_min)
        .bind(job.salary_max)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("job {}", job.id)));
        }
        Ok(())
    }

    async fn transition(&self, id: Uuid, transition: &JobTransition) -> DbResult<Option<Job>> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "UPDATE jobs SET status = $3, rejection_reason = $4,
                published_at = COALESCE($5, published_at),
                expires_at = COALESCE($6, expires_at),
                updated_at = $7
             WHERE id = $1 AND status = $2
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(id)
        .bind(transition.from.as_str())
        .bind(transition.to.as_str())
        .bind(&transition.rejection_reason)
        .bind(transition.published_at)
        .bind(transition.expires_at)
        .bind(Utc::now())
        .fetch_optional(self.pool())
        .await?;
        row.map(Job::try_from).transpose()
    }

    async fn delete(&self, id: Uuid, expected: JobStatus) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(expected.as_str())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_public(
        &self,
        filter: &JobFilter,
        page: PageRequest,
        now: DateTime<Utc>,
    ) -> DbResult<Page<Job>> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM jobs");
        push_public_filter(&mut count_qb, filter, now);
        let (total,): (i64,) = count_qb.build_query_as().fetch_one(self.pool()).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {JOB_COLUMNS} FROM jobs"));
        push_public_filter(&mut qb, filter, now);
        qb.push(" ORDER BY published_at DESC NULLS LAST, created_at DESC LIMIT ")
            .push_bind(page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
        let rows: Vec<JobRow> = qb.build_query_as().fetch_all(self.pool()).await?;

        Ok(Page::new(convert_all(rows)?, to_count(total), page))
    }

    async fn list_by_employer(&self, employer_id: Uuid) -> DbResult<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE employer_id = $1 ORDER BY created_at DESC"
        ))
        .bind(employer_id)
        .fetch_all(self.pool())
        .await?;
        convert_all(rows)
    }

    async fn list_by_status(&self, status: JobStatus, page: PageRequest) -> DbResult<Page<Job>> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(self.pool())
            .await?;

        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status = $1
             ORDER BY created_at ASC LIMIT $2 OFFSET $3"
        ))
        .bind(status.as_str())
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool())
        .await?;

        Ok(Page::new(convert_all(rows)?, to_count(total), page))
    }

    async fn count_by_status(&self) -> DbResult<Vec<(JobStatus, u64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM jobs GROUP BY status")
                .fetch_all(self.pool())
                .await?;
        rows.into_iter()
            .map(|(status, n)| Ok((status.parse()?, to_count(n))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_public_filter_sql() {
        let filter = JobFilter {
            query: Some("cfo".to_string()),
            remote: Some(true),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM jobs");
        push_public_filter(&mut qb, &filter, Utc::now());
        let sql = qb.sql();
        assert!(sql.contains("status = $1"));
        assert!(sql.contains("title ILIKE"));
        assert!(sql.contains("remote = "));
        assert!(!sql.contains("location ILIKE"));
    }
}
