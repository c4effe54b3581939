use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use execboard_models::{CandidateProfile, EmployerProfile};

use super::rows::{CandidateRow, EmployerRow};
use super::PgStore;
use crate::error::{DbError, DbResult};
use crate::repos::ProfileRepository;

const CANDIDATE_COLUMNS: &str = "id, user_id, headline, summary, location, years_experience, \
    specialties, resume_key, resume_file_name, created_at, updated_at";

const EMPLOYER_COLUMNS: &str = "id, user_id, company_name, organization_type, website, \
    description, location, verified, created_at, updated_at";

#[async_trait]
impl ProfileRepository for PgStore {
    async fn candidate_by_id(&self, id: Uuid) -> DbResult<Option<CandidateProfile>> {
        let row: Option<CandidateRow> = sqlx::query_as(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM candidate_profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Into::into))
    }

    async fn candidate_by_user(&self, user_id: Uuid) -> DbResult<Option<CandidateProfile>> {
        let row: Option<CandidateRow> = sqlx::query_as(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM candidate_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Into::into))
    }

    async fn update_candidate(&self, profile: &CandidateProfile) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE candidate_profiles SET headline = $2, summary = $3, location = $4,
                years_experience = $5, specialties = $6, resume_key = $7,
                resume_file_name = $8, updated_at = $9
             WHERE id = $1",
        )
        .bind(profile.id)
        .bind(&profile.headline)
        .bind(&profile.summary)
        .bind(&profile.location)
        .bind(profile.years_experience)
        .bind(&profile.specialties)
        .bind(&profile.resume_key)
        .bind(&profile.resume_file_name)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("candidate profile {}", profile.id)));
        }
        Ok(())
    }

    async fn employer_by_id(&self, id: Uuid) -> DbResult<Option<EmployerProfile>> {
        let row: Option<EmployerRow> = sqlx::query_as(&format!(
            "SELECT {EMPLOYER_COLUMNS} FROM employer_profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Into::into))
    }

    async fn employer_by_user(&self, user_id: Uuid) -> DbResult<Option<EmployerProfile>> {
        let row: Option<EmployerRow> = sqlx::query_as(&format!(
            "SELECT {EMPLOYER_COLUMNS} FROM employer_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Into::into))
    }

    async fn update_employer(&self, profile: &EmployerProfile) -> DbResult<()> {
        // verified is admin-owned and never written here
        let result = sqlx::query(
            "UPDATE employer_profiles SET company_name = $2, organization_type = $3,
                website = $4, description = $5, location = $6, updated_at = $7
             WHERE id = $1",
        )
        .bind(profile.id)
        .bind(&profile.company_name)
        .bind(&profile.organization_type)
        .bind(&profile.website)
        .bind(&profile.description)
        .bind(&profile.location)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("employer profile {}", profile.id)));
        }
        Ok(())
    }

    async fn set_employer_verified(
        &self,
        id: Uuid,
        verified: bool,
    ) -> DbResult<Option<EmployerProfile>> {
        let row: Option<EmployerRow> = sqlx::query_as(&format!(
            "UPDATE employer_profiles SET verified = $2, updated_at = $3
             WHERE id = $1 RETURNING {EMPLOYER_COLUMNS}"
        ))
        .bind(id)
        .bind(verified)
        .bind(Utc::now())
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Into::into))
    }
}
