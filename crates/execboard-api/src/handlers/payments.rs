//! Checkout, payment history and subscription handlers.

use std::sync::Arc;

use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use execboard_models::{JobStatus, Payment, Subscription, SubscriptionPlan};

use crate::auth::EmployerSession;
use crate::error::{ApiError, ApiResult};
use crate::handlers::jobs::owned_job;
use crate::metrics;
use crate::response::ApiResponse;
use crate::services::{CheckoutSession, JobCheckout, PaymentError, StripeClient, SubscriptionCheckout};
use crate::state::AppState;
use crate::validation::ValidatedJson;

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    pub job_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubscribeRequest {
    pub plan: SubscriptionPlan,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<CheckoutSession> for CheckoutResponse {
    fn from(session: CheckoutSession) -> Self {
        Self {
            session_id: session.id,
            url: session.url,
        }
    }
}

fn stripe(state: &AppState) -> Result<Arc<StripeClient>, PaymentError> {
    state.stripe.clone().ok_or(PaymentError::NotConfigured)
}

/// Start checkout for the posting fee of a job awaiting payment.
pub async fn create_checkout(
    State(state): State<AppState>,
    EmployerSession { session, employer_id }: EmployerSession,
    ValidatedJson(request): ValidatedJson<CheckoutRequest>,
) -> ApiResult<ApiResponse<CheckoutResponse>> {
    let job = owned_job(&state, employer_id, request.job_id).await?;
    if job.status != JobStatus::PendingPayment {
        return Err(ApiError::conflict("Job is not awaiting payment"));
    }
    let stripe = stripe(&state)?;

    let pricing = &state.config.pricing;
    let app_url = state.config.app_url.trim_end_matches('/');
    let checkout = JobCheckout {
        employer_id,
        job_id: job.id,
        job_title: job.title.clone(),
        amount_cents: pricing.job_posting_cents,
        currency: pricing.currency.clone(),
        customer_email: session.email.clone(),
        success_url: format!(
            "{app_url}/employer/jobs/{}?payment=success&session_id={{CHECKOUT_SESSION_ID}}",
            job.id
        ),
        cancel_url: format!("{app_url}/employer/jobs/{}?payment=cancelled", job.id),
    };
    let checkout_session = stripe.create_job_checkout(&checkout).await?;

    let payment = Payment::new(
        employer_id,
        Some(job.id),
        checkout_session.id.clone(),
        pricing.job_posting_cents,
        pricing.currency.clone(),
    );
    state.repos.payments.insert(&payment).await?;
    metrics::record_checkout_session("payment");
    info!(job_id = %job.id, session_id = %checkout_session.id, "Checkout session started");

    Ok(ApiResponse::created(checkout_session.into()))
}

/// Start a subscription checkout for a plan.
pub async fn subscribe(
    State(state): State<AppState>,
    EmployerSession { session, employer_id }: EmployerSession,
    ValidatedJson(request): ValidatedJson<SubscribeRequest>,
) -> ApiResult<ApiResponse<CheckoutResponse>> {
    let price_id = state
        .config
        .pricing
        .price_id(request.plan)
        .map(str::to_string)
        .ok_or_else(|| ApiError::field("plan", format!("Plan {} is not available", request.plan)))?;

    let current = state
        .repos
        .payments
        .subscription_for_employer(employer_id)
        .await?;
    if current.is_some_and(|s| s.is_active(Utc::now())) {
        return Err(ApiError::conflict("You already have an active subscription"));
    }
    let stripe = stripe(&state)?;

    let app_url = state.config.app_url.trim_end_matches('/');
    let checkout = SubscriptionCheckout {
        employer_id,
        plan: request.plan,
        price_id,
        customer_email: session.email.clone(),
        success_url: format!(
            "{app_url}/employer/billing?subscription=success&session_id={{CHECKOUT_SESSION_ID}}"
        ),
        cancel_url: format!("{app_url}/employer/billing?subscription=cancelled"),
    };
    let checkout_session = stripe.create_subscription_checkout(&checkout).await?;
    metrics::record_checkout_session("subscription");
    info!(employer_id = %employer_id, plan = %request.plan, "Subscription checkout started");

    Ok(ApiResponse::created(checkout_session.into()))
}

pub async fn list_payments(
    State(state): State<AppState>,
    EmployerSession { employer_id, .. }: EmployerSession,
) -> ApiResult<ApiResponse<Vec<Payment>>> {
    let payments = state.repos.payments.list_by_employer(employer_id).await?;
    Ok(ApiResponse::ok(payments))
}

/// The employer's subscription, or `null` when there is none.
pub async fn my_subscription(
    State(state): State<AppState>,
    EmployerSession { employer_id, .. }: EmployerSession,
) -> ApiResult<ApiResponse<Option<Subscription>>> {
    let subscription = state
        .repos
        .payments
        .subscription_for_employer(employer_id)
        .await?;
    Ok(ApiResponse::ok(subscription))
}
