use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::error::{DbError, DbResult};

/// Create a PostgreSQL connection pool.
///
/// - acquire timeout: 5 seconds
pub async fn create_pool(url: &str, max_connections: u32) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await
        .map_err(|e| DbError::Unavailable(format!("failed to connect to database: {e}")))?;

    info!(max_connections, "database connection pool created");
    Ok(pool)
}

/// Statements are idempotent and executed one at a time, since prepared
/// statements cannot carry multiple commands.
const SCHEMA: &[(&str, &str)] = &[
    (
        "users",
        "CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            name TEXT NOT NULL,
            role TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'ACTIVE',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    ),
    (
        "candidate_profiles",
        "CREATE TABLE IF NOT EXISTS candidate_profiles (
            id UUID PRIMARY KEY,
            user_id UUID UNIQUE NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            headline TEXT,
            summary TEXT,
            location TEXT,
            years_experience INT,
            specialties TEXT[] NOT NULL DEFAULT '{}',
            resume_key TEXT,
            resume_file_name TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    ),
    (
        "employer_profiles",
        "CREATE TABLE IF NOT EXISTS employer_profiles (
            id UUID PRIMARY KEY,
            user_id UUID UNIQUE NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            company_name TEXT NOT NULL,
            organization_type TEXT,
            website TEXT,
            description TEXT,
            location TEXT,
            verified BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    ),
    (
        "jobs",
        "CREATE TABLE IF NOT EXISTS jobs (
            id UUID PRIMARY KEY,
            employer_id UUID NOT NULL REFERENCES employer_profiles(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            location TEXT NOT NULL,
            remote BOOLEAN NOT NULL DEFAULT FALSE,
            employment_type TEXT NOT NULL,
            specialty TEXT,
            salary_min INT,
            salary_max INT,
            status TEXT NOT NULL,
            rejection_reason TEXT,
            published_at TIMESTAMPTZ,
            expires_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    ),
    (
        "jobs_status_idx",
        "CREATE INDEX IF NOT EXISTS jobs_status_idx ON jobs (status, published_at DESC)",
    ),
    (
        "applications",
        "CREATE TABLE IF NOT EXISTS applications (
            id UUID PRIMARY KEY,
            job_id UUID NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            candidate_id UUID NOT NULL REFERENCES candidate_profiles(id) ON DELETE CASCADE,
            cover_letter TEXT,
            status TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (job_id, candidate_id)
        )",
    ),
    (
        "messages",
        "CREATE TABLE IF NOT EXISTS messages (
            id UUID PRIMARY KEY,
            sender_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            recipient_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            application_id UUID REFERENCES applications(id) ON DELETE SET NULL,
            subject TEXT,
            body TEXT NOT NULL,
            read_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    ),
    (
        "notifications",
        "CREATE TABLE IF NOT EXISTS notifications (
            id UUID PRIMARY KEY,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            link TEXT,
            read_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    ),
    (
        "notifications_user_idx",
        "CREATE INDEX IF NOT EXISTS notifications_user_idx ON notifications (user_id, created_at DESC)",
    ),
    (
        "payments",
        "CREATE TABLE IF NOT EXISTS payments (
            id UUID PRIMARY KEY,
            employer_id UUID NOT NULL REFERENCES employer_profiles(id) ON DELETE CASCADE,
            job_id UUID REFERENCES jobs(id) ON DELETE SET NULL,
            checkout_session_id TEXT UNIQUE NOT NULL,
            payment_intent_id TEXT,
            amount_cents BIGINT NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            paid_at TIMESTAMPTZ
        )",
    ),
    (
        "subscriptions",
        "CREATE TABLE IF NOT EXISTS subscriptions (
            id UUID PRIMARY KEY,
            employer_id UUID UNIQUE NOT NULL REFERENCES employer_profiles(id) ON DELETE CASCADE,
            provider_subscription_id TEXT UNIQUE NOT NULL,
            provider_customer_id TEXT,
            plan TEXT NOT NULL,
            status TEXT NOT NULL,
            current_period_end TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    ),
];

/// Apply the schema (idempotent, uses IF NOT EXISTS).
pub async fn run_migrations(pool: &PgPool) -> DbResult<()> {
    for (name, statement) in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| DbError::Query(format!("migration ({name}) failed: {e}")))?;
    }

    info!(statements = SCHEMA.len(), "database migrations applied");
    Ok(())
}
