//! Stripe webhook receiver.
//!
//! Every event is signature-checked against the raw body before parsing.
//! Handlers are idempotent: replays of an already-applied event change
//! nothing and notify no one. Storage errors propagate as 5xx so the
//! provider retries the delivery.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use execboard_db::JobTransition;
use execboard_models::{
    JobStatus, NotificationKind, Payment, Subscription, SubscriptionPlan, SubscriptionStatus,
};

use crate::error::ApiResult;
use crate::metrics;
use crate::response::ApiResponse;
use crate::services::stripe::SIGNATURE_TOLERANCE_SECS;
use crate::services::{verify_webhook_signature, Notice, PaymentError, WebhookEvent};
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// What a single event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Applied,
    Duplicate,
    Skipped,
    Ignored,
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Outcome::Applied => "applied",
            Outcome::Duplicate => "duplicate",
            Outcome::Skipped => "skipped",
            Outcome::Ignored => "ignored",
        }
    }
}

fn str_field<'a>(object: &'a Value, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn metadata<'a>(object: &'a Value, key: &str) -> Option<&'a str> {
    object.get("metadata").and_then(|m| str_field(m, key))
}

fn metadata_uuid(object: &Value, key: &str) -> Option<Uuid> {
    metadata(object, key).and_then(|v| Uuid::parse_str(v).ok())
}

fn metadata_plan(object: &Value) -> Option<SubscriptionPlan> {
    metadata(object, "plan").and_then(|v| v.parse().ok())
}

fn unix_time(object: &Value, key: &str) -> Option<DateTime<Utc>> {
    object
        .get(key)
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Receive and apply one webhook delivery.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ApiResponse<WebhookAck>> {
    let secret = state
        .stripe
        .as_ref()
        .and_then(|s| s.webhook_secret())
        .ok_or(PaymentError::NotConfigured)?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PaymentError::InvalidSignature("missing signature header".to_string()))?;

    if let Err(e) = verify_webhook_signature(
        &body,
        signature,
        secret,
        Utc::now().timestamp(),
        SIGNATURE_TOLERANCE_SECS,
    ) {
        metrics::record_webhook_event("unknown", "invalid_signature");
        return Err(e.into());
    }

    let event = WebhookEvent::parse(&body)?;
    let result = dispatch(&state, &event).await;
    let outcome = match &result {
        Ok(outcome) => outcome.as_str(),
        Err(_) => "error",
    };
    metrics::record_webhook_event(&event.event_type, outcome);
    info!(event_id = %event.id, event_type = %event.event_type, outcome, "Webhook processed");
    result?;

    Ok(ApiResponse::ok(WebhookAck { received: true }))
}

async fn dispatch(state: &AppState, event: &WebhookEvent) -> ApiResult<Outcome> {
    let object = &event.data.object;
    match event.event_type.as_str() {
        "checkout.session.completed" => match str_field(object, "mode") {
            Some("subscription") => checkout_subscription_completed(state, object).await,
            _ => {
                if str_field(object, "payment_status") == Some("unpaid") {
                    // Delayed methods settle later via async_payment_succeeded
                    return Ok(Outcome::Skipped);
                }
                checkout_paid(state, object).await
            }
        },
        "checkout.session.async_payment_succeeded" => checkout_paid(state, object).await,
        "checkout.session.expired" | "checkout.session.async_payment_failed" => {
            checkout_failed(state, object).await
        }
        "payment_intent.payment_failed" => {
            warn!(
                payment_intent = str_field(object, "id").unwrap_or_default(),
                "Payment attempt failed"
            );
            Ok(Outcome::Skipped)
        }
        "customer.subscription.created" | "customer.subscription.updated" => {
            subscription_changed(state, object, false).await
        }
        "customer.subscription.deleted" => subscription_changed(state, object, true).await,
        _ => Ok(Outcome::Ignored),
    }
}

/// Mark the payment paid and send its job to review. Runs at most once per session.
async fn checkout_paid(state: &AppState, object: &Value) -> ApiResult<Outcome> {
    let Some(session_id) = str_field(object, "id") else {
        return Ok(Outcome::Ignored);
    };

    if state.repos.payments.find_by_session(session_id).await?.is_none() {
        record_untracked_payment(state, object, session_id).await?;
    }

    let payment_intent = str_field(object, "payment_intent");
    let Some(payment) = state
        .repos
        .payments
        .mark_paid(session_id, payment_intent, Utc::now())
        .await?
    else {
        return Ok(Outcome::Duplicate);
    };
    info!(session_id, payment_id = %payment.id, "Payment recorded");

    let Some(job_id) = payment.job_id else {
        return Ok(Outcome::Applied);
    };
    let transition = JobTransition::new(JobStatus::PendingPayment, JobStatus::PendingAdminReview);
    let Some(job) = state.repos.jobs.transition(job_id, &transition).await? else {
        warn!(job_id = %job_id, "Paid job was not awaiting payment");
        return Ok(Outcome::Applied);
    };

    let employer_notice = Notice::new(
        NotificationKind::PaymentReceived,
        "Payment received",
        format!("Payment for \"{}\" was received. It is now awaiting review.", job.title),
    )
    .with_link(format!("/employer/jobs/{}", job.id));
    state
        .notifier
        .notify_employer(job.employer_id, &employer_notice)
        .await;

    let admin_notice = Notice::new(
        NotificationKind::JobSubmitted,
        "Job awaiting review",
        format!("\"{}\" was paid and submitted for review", job.title),
    )
    .with_link("/admin/jobs");
    state.notifier.notify_admins(&admin_notice).await;

    Ok(Outcome::Applied)
}

/// Sessions created outside this API still carry our metadata; record them before marking paid.
async fn record_untracked_payment(state: &AppState, object: &Value, session_id: &str) -> ApiResult<()> {
    let Some(employer_id) = metadata_uuid(object, "employer_id") else {
        warn!(session_id, "Completed checkout has no employer metadata");
        return Ok(());
    };
    let payment = Payment::new(
        employer_id,
        metadata_uuid(object, "job_id"),
        session_id,
        object.get("amount_total").and_then(Value::as_i64).unwrap_or(0),
        str_field(object, "currency").unwrap_or("usd"),
    );
    state.repos.payments.insert(&payment).await?;
    Ok(())
}

async fn checkout_failed(state: &AppState, object: &Value) -> ApiResult<Outcome> {
    let Some(session_id) = str_field(object, "id") else {
        return Ok(Outcome::Ignored);
    };
    if state.repos.payments.mark_failed(session_id).await? {
        info!(session_id, "Payment marked failed");
        Ok(Outcome::Applied)
    } else {
        Ok(Outcome::Duplicate)
    }
}

async fn checkout_subscription_completed(state: &AppState, object: &Value) -> ApiResult<Outcome> {
    let (Some(provider_id), Some(employer_id), Some(plan)) = (
        str_field(object, "subscription"),
        metadata_uuid(object, "employer_id"),
        metadata_plan(object),
    ) else {
        warn!("Subscription checkout is missing subscription or metadata");
        return Ok(Outcome::Skipped);
    };

    let existing = state
        .repos
        .payments
        .subscription_by_provider_id(provider_id)
        .await?;
    if existing
        .as_ref()
        .is_some_and(|s| s.status == SubscriptionStatus::Active)
    {
        return Ok(Outcome::Duplicate);
    }

    let now = Utc::now();
    let subscription = Subscription {
        id: existing.as_ref().map_or_else(Uuid::new_v4, |s| s.id),
        employer_id,
        provider_subscription_id: provider_id.to_string(),
        provider_customer_id: str_field(object, "customer").map(str::to_string),
        plan,
        status: SubscriptionStatus::Active,
        current_period_end: existing.as_ref().and_then(|s| s.current_period_end),
        created_at: existing.as_ref().map_or(now, |s| s.created_at),
        updated_at: now,
    };
    state.repos.payments.upsert_subscription(&subscription).await?;
    info!(employer_id = %employer_id, plan = %plan, "Subscription activated");
    Ok(Outcome::Applied)
}

async fn subscription_changed(state: &AppState, object: &Value, deleted: bool) -> ApiResult<Outcome> {
    let Some(provider_id) = str_field(object, "id") else {
        return Ok(Outcome::Ignored);
    };
    let existing = state
        .repos
        .payments
        .subscription_by_provider_id(provider_id)
        .await?;

    let employer_id = metadata_uuid(object, "employer_id").or(existing.as_ref().map(|s| s.employer_id));
    let plan = metadata_plan(object).or(existing.as_ref().map(|s| s.plan));
    let (Some(employer_id), Some(plan)) = (employer_id, plan) else {
        warn!(provider_id, "Subscription event for an unknown employer");
        return Ok(Outcome::Skipped);
    };

    let status = if deleted {
        SubscriptionStatus::Canceled
    } else {
        str_field(object, "status").map_or(SubscriptionStatus::Incomplete, SubscriptionStatus::from_provider)
    };

    let now = Utc::now();
    // One row per employer: an inactive event for a replaced subscription
    // must not overwrite the live one.
    if existing.is_none() && status != SubscriptionStatus::Active {
        let current = state.repos.payments.subscription_for_employer(employer_id).await?;
        if let Some(current) = current.filter(|s| s.is_active(now)) {
            warn!(
                provider_id,
                current = %current.provider_subscription_id,
                "Ignoring event for a superseded subscription"
            );
            return Ok(Outcome::Skipped);
        }
    }

    let subscription = Subscription {
        id: existing.as_ref().map_or_else(Uuid::new_v4, |s| s.id),
        employer_id,
        provider_subscription_id: provider_id.to_string(),
        provider_customer_id: str_field(object, "customer")
            .map(str::to_string)
            .or_else(|| existing.as_ref().and_then(|s| s.provider_customer_id.clone())),
        plan,
        status,
        current_period_end: unix_time(object, "current_period_end")
            .or_else(|| existing.as_ref().and_then(|s| s.current_period_end)),
        created_at: existing.as_ref().map_or(now, |s| s.created_at),
        updated_at: now,
    };
    state.repos.payments.upsert_subscription(&subscription).await?;
    info!(employer_id = %employer_id, status = %status, "Subscription updated");
    Ok(Outcome::Applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_helpers() {
        let employer = Uuid::new_v4();
        let object = json!({
            "id": "cs_1",
            "current_period_end": 1_700_000_000,
            "metadata": { "employer_id": employer.to_string(), "plan": "professional", "job_id": "" }
        });
        assert_eq!(metadata_uuid(&object, "employer_id"), Some(employer));
        assert_eq!(metadata_uuid(&object, "job_id"), None);
        assert_eq!(metadata_plan(&object), Some(SubscriptionPlan::Professional));
        assert_eq!(
            unix_time(&object, "current_period_end").map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
        assert_eq!(str_field(&object, "missing"), None);
    }
}
