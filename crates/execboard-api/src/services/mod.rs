//! Business services shared by handlers.

pub mod notifications;
pub mod stripe;
pub mod uploads;

pub use notifications::{Notice, Notifier};
pub use stripe::{
    sign_webhook_payload, verify_webhook_signature, CheckoutSession, JobCheckout, PaymentError,
    StripeClient, StripeConfig, SubscriptionCheckout, WebhookEvent,
};
pub use uploads::{validate_resume, ResumeFormat, MAX_RESUME_BYTES};
