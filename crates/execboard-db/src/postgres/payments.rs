use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use execboard_models::{Payment, PaymentStatus, Subscription};

use super::rows::{convert_all, PaymentRow, SubscriptionRow};
use super::PgStore;
use crate::error::{DbError, DbResult};
use crate::repos::PaymentRepository;

const PAYMENT_COLUMNS: &str = "id, employer_id, job_id, checkout_session_id, payment_intent_id, \
    amount_cents, currency, status, created_at, paid_at";

const SUBSCRIPTION_COLUMNS: &str = "id, employer_id, provider_subscription_id, \
    provider_customer_id, plan, status, current_period_end, created_at, updated_at";

#[async_trait]
impl PaymentRepository for PgStore {
    async fn insert(&self, payment: &Payment) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO payments (id, employer_id, job_id, checkout_session_id, payment_intent_id,
                amount_cents, currency, status, created_at, paid_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(payment.id)
        .bind(payment.employer_id)
        .bind(payment.job_id)
        .bind(&payment.checkout_session_id)
        .bind(&payment.payment_intent_id)
        .bind(payment.amount_cents)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .bind(payment.paid_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn find_by_session(&self, checkout_session_id: &str) -> DbResult<Option<Payment>> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE checkout_session_id = $1"
        ))
        .bind(checkout_session_id)
        .fetch_optional(self.pool())
        .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn mark_paid(
        &self,
        checkout_session_id: &str,
        payment_intent_id: Option<&str>,
        paid_at: DateTime<Utc>,
    ) -> DbResult<Option<Payment>> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "UPDATE payments SET status = $2,
                payment_intent_id = COALESCE($3, payment_intent_id), paid_at = $4
             WHERE checkout_session_id = $1 AND status <> $2
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(checkout_session_id)
        .bind(PaymentStatus::Paid.as_str())
        .bind(payment_intent_id)
        .bind(paid_at)
        .fetch_optional(self.pool())
        .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn mark_failed(&self, checkout_session_id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE payments SET status = $2 WHERE checkout_session_id = $1 AND status = $3",
        )
        .bind(checkout_session_id)
        .bind(PaymentStatus::Failed.as_str())
        .bind(PaymentStatus::Pending.as_str())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_by_employer(&self, employer_id: Uuid) -> DbResult<Vec<Payment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE employer_id = $1 ORDER BY created_at DESC"
        ))
        .bind(employer_id)
        .fetch_all(self.pool())
        .await?;
        convert_all(rows)
    }

    async fn total_paid_cents(&self) -> DbResult<i64> {
        let (total,): (Option<i64>,) =
            sqlx::query_as("SELECT SUM(amount_cents)::BIGINT FROM payments WHERE status = $1")
                .bind(PaymentStatus::Paid.as_str())
                .fetch_one(self.pool())
                .await?;
        Ok(total.unwrap_or(0))
    }

    async fn upsert_subscription(&self, subscription: &Subscription) -> DbResult<Subscription> {
        let row: SubscriptionRow = sqlx::query_as(&format!(
            "INSERT INTO subscriptions (id, employer_id, provider_subscription_id,
                provider_customer_id, plan, status, current_period_end, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (employer_id) DO UPDATE SET
                provider_subscription_id = EXCLUDED.provider_subscription_id,
                provider_customer_id = COALESCE(EXCLUDED.provider_customer_id, subscriptions.provider_customer_id),
                plan = EXCLUDED.plan,
                status = EXCLUDED.status,
                current_period_end = EXCLUDED.current_period_end,
                updated_at = EXCLUDED.updated_at
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(subscription.id)
        .bind(subscription.employer_id)
        .bind(&subscription.provider_subscription_id)
        .bind(&subscription.provider_customer_id)
        .bind(subscription.plan.as_str())
        .bind(subscription.status.as_str())
        .bind(subscription.current_period_end)
        .bind(subscription.created_at)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Conflict(_) => DbError::conflict(format!(
                "subscription {} belongs to another employer",
                subscription.provider_subscription_id
            )),
            other => other,
        })?;
        Subscription::try_from(row)
    }

    async fn subscription_for_employer(&self, employer_id: Uuid) -> DbResult<Option<Subscription>> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE employer_id = $1"
        ))
        .bind(employer_id)
        .fetch_optional(self.pool())
        .await?;
        row.map(Subscription::try_from).transpose()
    }

    async fn subscription_by_provider_id(&self, provider_id: &str) -> DbResult<Option<Subscription>> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE provider_subscription_id = $1"
        ))
        .bind(provider_id)
        .fetch_optional(self.pool())
        .await?;
        row.map(Subscription::try_from).transpose()
    }
}
