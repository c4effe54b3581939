//! API configuration.

use std::time::Duration;

use execboard_kv::RatePolicy;
use execboard_models::SubscriptionPlan;
use thiserror::Error;

/// Minimum accepted length for `AUTH_SECRET`.
pub const MIN_AUTH_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Per-route-group rate limits.
#[derive(Debug, Clone)]
pub struct RatePolicies {
    pub default: RatePolicy,
    pub auth: RatePolicy,
    pub ai: RatePolicy,
    pub upload: RatePolicy,
}

impl Default for RatePolicies {
    fn default() -> Self {
        Self {
            default: RatePolicy::new("default", 100, 60),
            auth: RatePolicy::new("auth", 10, 60),
            ai: RatePolicy::new("ai", 10, 60),
            upload: RatePolicy::new("upload", 10, 60),
        }
    }
}

impl RatePolicies {
    /// Each policy can be overridden with `RATE_LIMIT_<NAME>=<limit>/<window_secs>`.
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            default: policy_from_env("RATE_LIMIT_DEFAULT", defaults.default)?,
            auth: policy_from_env("RATE_LIMIT_AUTH", defaults.auth)?,
            ai: policy_from_env("RATE_LIMIT_AI", defaults.ai)?,
            upload: policy_from_env("RATE_LIMIT_UPLOAD", defaults.upload)?,
        })
    }
}

fn policy_from_env(var: &'static str, default: RatePolicy) -> Result<RatePolicy, ConfigError> {
    let Ok(raw) = std::env::var(var) else {
        return Ok(default);
    };
    parse_policy(&default.name, &raw).ok_or_else(|| ConfigError::Invalid {
        var,
        reason: format!("expected <limit>/<window_secs>, got '{raw}'"),
    })
}

fn parse_policy(name: &str, raw: &str) -> Option<RatePolicy> {
    let (limit, window) = raw.split_once('/')?;
    let limit: u64 = limit.trim().parse().ok()?;
    let window: u64 = window.trim().parse().ok()?;
    if limit == 0 || window == 0 {
        return None;
    }
    Some(RatePolicy::new(name, limit, window))
}

/// Prices shown at checkout.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// One-off fee for a single job posting
    pub job_posting_cents: i64,
    pub currency: String,
    pub basic_price_id: Option<String>,
    pub professional_price_id: Option<String>,
    pub enterprise_price_id: Option<String>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            job_posting_cents: 29_900,
            currency: "usd".to_string(),
            basic_price_id: None,
            professional_price_id: None,
            enterprise_price_id: None,
        }
    }
}

impl PricingConfig {
    /// Processor price id for a subscription plan, if one is configured.
    pub fn price_id(&self, plan: SubscriptionPlan) -> Option<&str> {
        match plan {
            SubscriptionPlan::Basic => self.basic_price_id.as_deref(),
            SubscriptionPlan::Professional => self.professional_price_id.as_deref(),
            SubscriptionPlan::Enterprise => self.enterprise_price_id.as_deref(),
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// HS256 signing secret for session tokens
    pub auth_secret: String,
    pub session_ttl: Duration,
    /// Public web app URL, used for checkout redirects and notification links
    pub app_url: String,
    pub rate_limits: RatePolicies,
    pub pricing: PricingConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["http://localhost:3000".to_string()],
            max_body_size: 6 * 1024 * 1024, // 6MB, room for a 5MB resume plus multipart overhead
            environment: "development".to_string(),
            auth_secret: "development-only-secret-change-me-0000".to_string(),
            session_ttl: Duration::from_secs(7 * 24 * 3600),
            app_url: "http://localhost:3000".to_string(),
            rate_limits: RatePolicies::default(),
            pricing: PricingConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let auth_secret = std::env::var("AUTH_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("AUTH_SECRET"))?;
        if auth_secret.len() < MIN_AUTH_SECRET_LEN {
            return Err(ConfigError::Invalid {
                var: "AUTH_SECRET",
                reason: format!("must be at least {MIN_AUTH_SECRET_LEN} characters"),
            });
        }

        Ok(Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT", defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_size: env_parse("MAX_BODY_SIZE", defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            auth_secret,
            session_ttl: Duration::from_secs(env_parse(
                "SESSION_TTL_SECS",
                defaults.session_ttl.as_secs(),
            )),
            app_url: std::env::var("APP_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.app_url),
            rate_limits: RatePolicies::from_env()?,
            pricing: PricingConfig {
                job_posting_cents: env_parse("JOB_POSTING_PRICE_CENTS", 29_900),
                currency: std::env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "usd".to_string()),
                basic_price_id: std::env::var("STRIPE_PRICE_BASIC").ok(),
                professional_price_id: std::env::var("STRIPE_PRICE_PROFESSIONAL").ok(),
                enterprise_price_id: std::env::var("STRIPE_PRICE_ENTERPRISE").ok(),
            },
        })
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
