//! Application state.

use std::sync::Arc;

use tracing::{info, warn};

use execboard_ai::{GeminiClient, GeminiConfig, LanguageModel};
use execboard_db::{create_pool, run_migrations, Repositories};
use execboard_kv::{CsrfStore, KvStore, MemoryKvStore, RateLimiter, RedisConfig, RedisKvStore};
use execboard_storage::{ObjectStore, R2Client, R2Config};

use crate::auth::SessionKeys;
use crate::config::ApiConfig;
use crate::services::{Notifier, StripeClient, StripeConfig};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub repos: Repositories,
    pub kv: Arc<dyn KvStore>,
    pub rate_limiter: RateLimiter,
    pub csrf: CsrfStore,
    pub sessions: SessionKeys,
    pub notifier: Notifier,
    /// Resume storage; `None` disables uploads
    pub storage: Option<Arc<dyn ObjectStore>>,
    /// Language model; `None` disables AI routes
    pub ai: Option<Arc<dyn LanguageModel>>,
    /// Payment processor; `None` disables checkout and webhooks
    pub stripe: Option<Arc<StripeClient>>,
}

impl AppState {
    /// State over the given stores with every optional integration disabled.
    pub fn new(config: ApiConfig, repos: Repositories, kv: Arc<dyn KvStore>) -> Self {
        let sessions = SessionKeys::new(&config.auth_secret, config.session_ttl);
        let notifier = Notifier::new(&repos);
        Self {
            config: Arc::new(config),
            rate_limiter: RateLimiter::new(Arc::clone(&kv)),
            csrf: CsrfStore::new(Arc::clone(&kv)),
            kv,
            repos,
            sessions,
            notifier,
            storage: None,
            ai: None,
            stripe: None,
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn ObjectStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_ai(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.ai = Some(model);
        self
    }

    pub fn with_stripe(mut self, stripe: StripeClient) -> Self {
        self.stripe = Some(Arc::new(stripe));
        self
    }

    /// Build state from environment variables.
    ///
    /// Only the database is mandatory in production. Redis, R2, Gemini and
    /// Stripe are optional and their routes answer 503 when absent.
    pub async fn from_env(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let repos = match std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()) {
            Some(url) => {
                let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10);
                let pool = create_pool(&url, max_connections).await?;
                if std::env::var("RUN_MIGRATIONS").map(|v| v == "true" || v == "1").unwrap_or(false) {
                    run_migrations(&pool).await?;
                }
                Repositories::postgres(pool)
            }
            None if config.is_production() => {
                return Err("DATABASE_URL is required in production".into());
            }
            None => {
                warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
                Repositories::in_memory()
            }
        };

        let kv: Arc<dyn KvStore> = match RedisConfig::from_env() {
            Some(redis) => Arc::new(RedisKvStore::new(redis)?),
            None => {
                warn!("REDIS_URL not set, using in-process counters (single instance only)");
                Arc::new(MemoryKvStore::default())
            }
        };

        let mut state = Self::new(config, repos, kv);

        match R2Config::from_env()? {
            Some(r2) => state = state.with_storage(Arc::new(R2Client::new(r2))),
            None => info!("R2 storage not configured, resume uploads disabled"),
        }

        match GeminiConfig::from_env() {
            Some(gemini) => state = state.with_ai(Arc::new(GeminiClient::new(gemini)?)),
            None => info!("GEMINI_API_KEY not set, AI features disabled"),
        }

        match StripeConfig::from_env() {
            Some(stripe) => state = state.with_stripe(StripeClient::new(stripe)?),
            None => info!("STRIPE_SECRET_KEY not set, payments disabled"),
        }

        Ok(state)
    }
}
