//! Stripe hosted checkout and webhook verification.

use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use execboard_models::SubscriptionPlan;

type HmacSha256 = Hmac<Sha256>;

/// Accepted clock skew between the signature timestamp and now.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payments are not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Payment provider returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(e: reqwest::Error) -> Self {
        PaymentError::Network(e.to_string())
    }
}

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    /// Endpoint signing secret (`whsec_...`)
    pub webhook_secret: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl StripeConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.stripe.com";

    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            webhook_secret: None,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    /// Returns `None` without `STRIPE_SECRET_KEY`.
    pub fn from_env() -> Option<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY").ok().filter(|k| !k.is_empty())?;
        let mut config = Self::new(secret_key);
        config.webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        if let Ok(base_url) = std::env::var("STRIPE_API_BASE") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        Some(config)
    }
}

/// Checkout for a single job posting fee.
#[derive(Debug, Clone)]
pub struct JobCheckout {
    pub employer_id: Uuid,
    pub job_id: Uuid,
    pub job_title: String,
    pub amount_cents: i64,
    pub currency: String,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Checkout for a recurring subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionCheckout {
    pub employer_id: Uuid,
    pub plan: SubscriptionPlan,
    pub price_id: String,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Hosted checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub struct StripeClient {
    config: StripeConfig,
    http: Client,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> PaymentResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Network(format!("failed to build HTTP client: {e}")))?;
        info!(
            webhooks = config.webhook_secret.is_some(),
            "Stripe client configured"
        );
        Ok(Self { config, http })
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.config.webhook_secret.as_deref()
    }

    pub async fn create_job_checkout(&self, checkout: &JobCheckout) -> PaymentResult<CheckoutSession> {
        let employer_id = checkout.employer_id.to_string();
        let job_id = checkout.job_id.to_string();
        let form = vec![
            ("mode", "payment".to_string()),
            ("success_url", checkout.success_url.clone()),
            ("cancel_url", checkout.cancel_url.clone()),
            ("customer_email", checkout.customer_email.clone()),
            ("client_reference_id", employer_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", checkout.currency.clone()),
            (
                "line_items[0][price_data][unit_amount]",
                checkout.amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                format!("Job posting: {}", checkout.job_title),
            ),
            ("metadata[kind]", "job_posting".to_string()),
            ("metadata[employer_id]", employer_id),
            ("metadata[job_id]", job_id),
        ];
        self.create_checkout_session(&form).await
    }

    pub async fn create_subscription_checkout(
        &self,
        checkout: &SubscriptionCheckout,
    ) -> PaymentResult<CheckoutSession> {
        let employer_id = checkout.employer_id.to_string();
        let plan = checkout.plan.as_str().to_string();
        let form = vec![
            ("mode", "subscription".to_string()),
            ("success_url", checkout.success_url.clone()),
            ("cancel_url", checkout.cancel_url.clone()),
            ("customer_email", checkout.customer_email.clone()),
            ("client_reference_id", employer_id.clone()),
            ("line_items[0][price]", checkout.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("metadata[kind]", "subscription".to_string()),
            ("metadata[employer_id]", employer_id.clone()),
            ("metadata[plan]", plan.clone()),
            ("subscription_data[metadata][employer_id]", employer_id),
            ("subscription_data[metadata][plan]", plan),
        ];
        self.create_checkout_session(&form).await
    }

    async fn create_checkout_session(
        &self,
        form: &[(&str, String)],
    ) -> PaymentResult<CheckoutSession> {
        let url = format!("{}/v1/checkout/sessions", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| body.chars().take(300).collect());
            warn!(status = status.as_u16(), message = %message, "Checkout session creation failed");
            return Err(PaymentError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let session: CheckoutSession = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;
        debug!(session_id = %session.id, "Checkout session created");
        Ok(session)
    }
}

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`).
///
/// The signed payload is `"{t}.{body}"`. Any matching `v1` entry is accepted.
pub fn verify_webhook_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> PaymentResult<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(PaymentError::InvalidSignature(
            "no v1 signature present".to_string(),
        ));
    }
    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(PaymentError::InvalidSignature(
            "timestamp outside tolerance".to_string(),
        ));
    }

    let mac = signed_payload_mac(payload, secret, timestamp)?;
    if signatures
        .iter()
        .any(|sig| mac.clone().verify_slice(sig).is_ok())
    {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature(
            "no matching signature".to_string(),
        ))
    }
}

/// Build a `Stripe-Signature` header value for `payload`.
pub fn sign_webhook_payload(payload: &[u8], secret: &str, timestamp: i64) -> PaymentResult<String> {
    let mac = signed_payload_mac(payload, secret, timestamp)?;
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

fn signed_payload_mac(payload: &[u8], secret: &str, timestamp: i64) -> PaymentResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::InvalidSignature(format!("invalid secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Webhook event envelope. `data.object` is kept as raw JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> PaymentResult<Self> {
        serde_json::from_slice(payload).map_err(|e| PaymentError::InvalidPayload(e.to_string()))
    }
}
