use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use execboard_models::{AccountStatus, Page, PageRequest, Role, User};

use super::rows::{convert_all, UserRow};
use super::{to_count, PgStore};
use crate::error::{DbError, DbResult};
use crate::repos::{LinkedProfile, UserRepository};

const USER_COLUMNS: &str = "id, email, password_hash, name, role, status, created_at, updated_at";

#[async_trait]
impl UserRepository for PgStore {
    async fn create(&self, user: &User, profile: &LinkedProfile) -> DbResult<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO users (id, email, password_hash, name, role, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Conflict(_) => DbError::conflict(format!("user '{}' already exists", user.email)),
            other => other,
        })?;

        match profile {
            LinkedProfile::Candidate(p) => {
                sqlx::query(
                    "INSERT INTO candidate_profiles (id, user_id, created_at, updated_at)
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(p.id)
                .bind(p.user_id)
                .bind(p.created_at)
                .bind(p.updated_at)
                .execute(&mut *tx)
                .await?;
            }
            LinkedProfile::Employer(p) => {
                sqlx::query(
                    "INSERT INTO employer_profiles (id, user_id, company_name, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(p.id)
                .bind(p.user_id)
                .bind(&p.company_name)
                .bind(p.created_at)
                .bind(p.updated_at)
                .execute(&mut *tx)
                .await?;
            }
            LinkedProfile::None => {}
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool())
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email.to_lowercase())
                .fetch_optional(self.pool())
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn list(
        &self,
        role: Option<Role>,
        status: Option<AccountStatus>,
        page: PageRequest,
    ) -> DbResult<Page<User>> {
        let role = role.map(|r| r.as_str());
        let status = status.map(|s| s.as_str());

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM users
             WHERE ($1::text IS NULL OR role = $1) AND ($2::text IS NULL OR status = $2)",
        )
        .bind(role)
        .bind(status)
        .fetch_one(self.pool())
        .await?;

        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE ($1::text IS NULL OR role = $1) AND ($2::text IS NULL OR status = $2)
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(role)
        .bind(status)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool())
        .await?;

        Ok(Page::new(convert_all(rows)?, to_count(total), page))
    }

    async fn ids_by_role(&self, role: Role) -> DbResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE role = $1 AND status = 'ACTIVE'")
                .bind(role.as_str())
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn set_status(&self, id: Uuid, status: AccountStatus) -> DbResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "UPDATE users SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(Utc::now())
        .fetch_optional(self.pool())
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn count_by_role(&self) -> DbResult<Vec<(Role, u64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role")
                .fetch_all(self.pool())
                .await?;
        rows.into_iter()
            .map(|(role, n)| Ok((role.parse()?, to_count(n))))
            .collect()
    }
}
