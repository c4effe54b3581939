//! Fixed-window request counters.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::error::{KvError, KvResult};
use crate::store::KvStore;

/// Named limit applied to a group of routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatePolicy {
    /// Key prefix, e.g. "auth"
    pub name: String,
    pub limit: u64,
    pub window_secs: u64,
}

impl RatePolicy {
    pub fn new(name: impl Into<String>, limit: u64, window_secs: u64) -> Self {
        Self {
            name: name.into(),
            limit,
            window_secs,
        }
    }

    /// Counter key for one client and route.
    pub fn key(&self, ip: &str, method: &str, path: &str) -> String {
        format!("{}:{}:{}:{}", self.name, ip, method, path)
    }
}

/// Outcome of one counted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub limited: bool,
    pub remaining: u64,
    pub count: u64,
    pub limit: u64,
    pub window_secs: u64,
}

impl RateDecision {
    fn allowed_without_count(limit: u64, window_secs: u64) -> Self {
        Self {
            limited: false,
            remaining: limit,
            count: 0,
            limit,
            window_secs,
        }
    }
}

/// Rate limiter over a [`KvStore`].
///
/// Each call costs one `INCR`, plus one `EXPIRE` on the first hit of a window.
/// Store failures let the request through.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Count a request against `key`.
    ///
    /// Returns an error only for invalid arguments.
    pub async fn check(&self, key: &str, limit: u64, window_secs: u64) -> KvResult<RateDecision> {
        if key.is_empty() {
            return Err(KvError::invalid_argument("rate limit key must not be empty"));
        }
        if limit == 0 || window_secs == 0 {
            return Err(KvError::invalid_argument(
                "rate limit and window must be positive",
            ));
        }

        let count = match self.store.incr(key).await {
            Ok(count) => count,
            Err(e) => {
                warn!(key = %key, error = %e, "Rate limit store unavailable, allowing request");
                return Ok(RateDecision::allowed_without_count(limit, window_secs));
            }
        };

        let count = u64::try_from(count).unwrap_or(0);
        let limited = count > limit;
        let window = Duration::from_secs(window_secs);

        if count == 1 {
            if let Err(e) = self.store.expire(key, window).await {
                warn!(key = %key, error = %e, "Failed to set rate limit window expiry");
            }
        } else if limited {
            // A lost first EXPIRE would otherwise pin the counter forever
            match self.store.ttl(key).await {
                Ok(None) => {
                    warn!(key = %key, "Rate limit counter had no expiry, restoring window");
                    if let Err(e) = self.store.expire(key, window).await {
                        warn!(key = %key, error = %e, "Failed to restore rate limit window expiry");
                    }
                }
                Ok(Some(_)) => {}
                Err(e) => warn!(key = %key, error = %e, "Failed to read rate limit window expiry"),
            }
        }

        Ok(RateDecision {
            limited,
            remaining: limit.saturating_sub(count),
            count,
            limit,
            window_secs,
        })
    }

    /// Count a request under `policy`.
    pub async fn check_policy(
        &self,
        policy: &RatePolicy,
        ip: &str,
        method: &str,
        path: &str,
    ) -> KvResult<RateDecision> {
        self.check(&policy.key(ip, method, path), policy.limit, policy.window_secs)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKvStore;
    use async_trait::async_trait;

    struct DownStore;

    #[async_trait]
    impl KvStore for DownStore {
        async fn incr(&self, _key: &str) -> KvResult<i64> {
            Err(KvError::connection_failed("refused"))
        }
        async fn expire(&self, _key: &str, _ttl: Duration) -> KvResult<()> {
            Err(KvError::connection_failed("refused"))
        }
        async fn ttl(&self, _key: &str) -> KvResult<Option<Duration>> {
            Err(KvError::connection_failed("refused"))
        }
        async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> KvResult<()> {
            Err(KvError::connection_failed("refused"))
        }
        async fn get(&self, _key: &str) -> KvResult<Option<String>> {
            Err(KvError::connection_failed("refused"))
        }
        async fn delete(&self, _key: &str) -> KvResult<bool> {
            Err(KvError::connection_failed("refused"))
        }
        async fn ping(&self) -> KvResult<()> {
            Err(KvError::connection_failed("refused"))
        }
    }

    /// Memory store whose first `expire` call fails.
    #[derive(Default)]
    struct LostExpireStore {
        inner: MemoryKvStore,
        failed_once: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl KvStore for LostExpireStore {
        async fn incr(&self, key: &str) -> KvResult<i64> {
            self.inner.incr(key).await
        }
        async fn expire(&self, key: &str, ttl: Duration) -> KvResult<()> {
            if !self.failed_once.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Err(KvError::Timeout("EXPIRE".to_string()));
            }
            self.inner.expire(key, ttl).await
        }
        async fn ttl(&self, key: &str) -> KvResult<Option<Duration>> {
            self.inner.ttl(key).await
        }
        async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
            self.inner.set_ex(key, value, ttl).await
        }
        async fn get(&self, key: &str) -> KvResult<Option<String>> {
            self.inner.get(key).await
        }
        async fn delete(&self, key: &str) -> KvResult<bool> {
            self.inner.delete(key).await
        }
        async fn ping(&self) -> KvResult<()> {
            Ok(())
        }
    }

    fn limiter() -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryKvStore::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_after_limit_are_limited() {
        let limiter = limiter();
        for i in 1..=3 {
            let d = limiter.check("auth:1.2.3.4:POST:/api/auth/login", 3, 60).await.unwrap();
            assert!(!d.limited, "request {i} should pass");
            assert_eq!(d.remaining, 3 - i);
        }
        let d = limiter.check("auth:1.2.3.4:POST:/api/auth/login", 3, 60).await.unwrap();
        assert!(d.limited);
        assert_eq!(d.remaining, 0);
        assert_eq!(d.count, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expiry_resets_count() {
        let limiter = limiter();
        let key = "default:10.0.0.1:GET:/api/jobs";
        for _ in 0..3 {
            limiter.check(key, 2, 60).await.unwrap();
        }
        assert!(limiter.check(key, 2, 60).await.unwrap().limited);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!limiter.check(key, 2, 60).await.unwrap().limited);
        assert!(!limiter.check(key, 2, 60).await.unwrap().limited);
        assert!(limiter.check(key, 2, 60).await.unwrap().limited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_expiry_is_restored_once_limited() {
        let limiter = RateLimiter::new(Arc::new(LostExpireStore::default()));
        let key = "auth:10.0.0.2:POST:/api/auth/login";
        assert!(!limiter.check(key, 2, 60).await.unwrap().limited);
        assert!(!limiter.check(key, 2, 60).await.unwrap().limited);
        assert!(limiter.check(key, 2, 60).await.unwrap().limited);

        tokio::time::advance(Duration::from_secs(3600)).await;
        let d = limiter.check(key, 2, 60).await.unwrap();
        assert!(!d.limited);
        assert_eq!(d.count, 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = limiter();
        assert!(!limiter.check("a", 1, 60).await.unwrap().limited);
        assert!(limiter.check("a", 1, 60).await.unwrap().limited);
        assert!(!limiter.check("b", 1, 60).await.unwrap().limited);
    }

    #[tokio::test]
    async fn test_invalid_arguments_rejected() {
        let limiter = limiter();
        assert!(limiter.check("", 1, 60).await.is_err());
        assert!(limiter.check("k", 0, 60).await.is_err());
        assert!(limiter.check("k", 1, 0).await.is_err());
    }

    #[tokio::test]
    async fn test_fails_open_when_store_down() {
        let limiter = RateLimiter::new(Arc::new(DownStore));
        let d = limiter.check("k", 1, 60).await.unwrap();
        assert!(!d.limited);
        assert_eq!(d.remaining, 1);
    }

    #[test]
    fn test_policy_key_format() {
        let policy = RatePolicy::new("ai", 10, 60);
        assert_eq!(
            policy.key("203.0.113.9", "POST", "/api/ai/job-match"),
            "ai:203.0.113.9:POST:/api/ai/job-match"
        );
    }
}
