//! CSRF tokens for cookie-authenticated requests.
//!
//! Unlike rate limiting, verification fails closed: a store error is returned
//! to the caller instead of being treated as a valid token.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::error::KvResult;
use crate::store::KvStore;

/// Default token lifetime.
pub const CSRF_TOKEN_TTL: Duration = Duration::from_secs(3600);

const TOKEN_LEN: usize = 64;

#[derive(Clone)]
pub struct CsrfStore {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl CsrfStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            ttl: CSRF_TOKEN_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(token: &str) -> String {
        format!("csrf:{token}")
    }

    /// Issue and store a new token (256 random bits, hex).
    pub async fn issue(&self) -> KvResult<String> {
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        self.store.set_ex(&Self::key(&token), "1", self.ttl).await?;
        Ok(token)
    }

    /// Check that `token` was issued and has not expired.
    pub async fn verify(&self, token: &str) -> KvResult<bool> {
        if token.len() != TOKEN_LEN || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Ok(false);
        }
        Ok(self.store.get(&Self::key(token)).await?.is_some())
    }
}
