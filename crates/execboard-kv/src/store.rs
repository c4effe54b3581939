//! Key-value store backends.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{KvError, KvResult};

/// Minimal command set needed by the rate limiter and CSRF store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Increment an integer key by one, creating it at 1. Returns the new value.
    async fn incr(&self, key: &str) -> KvResult<i64>;
    /// Set a TTL on an existing key.
    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<()>;
    /// Remaining TTL. `None` if the key is missing or never expires.
    async fn ttl(&self, key: &str) -> KvResult<Option<Duration>>;
    /// Store a value with a TTL.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()>;
    async fn get(&self, key: &str) -> KvResult<Option<String>>;
    /// Returns true if the key existed.
    async fn delete(&self, key: &str) -> KvResult<bool>;
    async fn ping(&self) -> KvResult<()>;
}

/// Redis store configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL
    pub redis_url: String,
    /// Per-command timeout
    pub op_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            op_timeout: Duration::from_millis(500),
        }
    }
}

impl RedisConfig {
    /// Create config from environment variables. Returns `None` without `REDIS_URL`.
    pub fn from_env() -> Option<Self> {
        let redis_url = std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty())?;
        Some(Self {
            redis_url,
            op_timeout: Duration::from_millis(
                std::env::var("REDIS_OP_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            ),
        })
    }
}

/// Redis-backed store. The connection is established on first use and
/// reconnects on its own afterwards.
pub struct RedisKvStore {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
    op_timeout: Duration,
}

impl RedisKvStore {
    pub fn new(config: RedisConfig) -> KvResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        info!("Redis KV store configured");
        Ok(Self {
            client,
            conn: OnceCell::new(),
            op_timeout: config.op_timeout,
        })
    }

    async fn conn(&self) -> KvResult<ConnectionManager> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                tokio::time::timeout(self.op_timeout, ConnectionManager::new(self.client.clone()))
                    .await
                    .map_err(|_| KvError::connection_failed("timed out connecting to redis"))?
                    .map_err(KvError::from)
            })
            .await?;
        Ok(conn.clone())
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = redis::RedisResult<T>>,
    ) -> KvResult<T> {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| KvError::Timeout(op.to_string()))?
            .map_err(KvError::from)
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn incr(&self, key: &str) -> KvResult<i64> {
        let mut conn = self.conn().await?;
        self.bounded("INCR", conn.incr(key, 1)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<()> {
        let mut conn = self.conn().await?;
        let secs = ttl.as_secs().max(1) as i64;
        self.bounded("EXPIRE", conn.expire::<_, ()>(key, secs)).await
    }

    async fn ttl(&self, key: &str) -> KvResult<Option<Duration>> {
        let mut conn = self.conn().await?;
        // -2 missing, -1 no expiry
        let secs: i64 = self.bounded("TTL", conn.ttl(key)).await?;
        Ok(u64::try_from(secs).ok().map(Duration::from_secs))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        let mut conn = self.conn().await?;
        let secs = ttl.as_secs().max(1);
        self.bounded("SETEX", conn.set_ex::<_, _, ()>(key, value, secs)).await
    }

    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.conn().await?;
        self.bounded("GET", conn.get(key)).await
    }

    async fn delete(&self, key: &str) -> KvResult<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = self.bounded("DEL", conn.del(key)).await?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> KvResult<()> {
        let mut conn = self.conn().await?;
        let _: String = self
            .bounded("PING", redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(())
    }
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug)]
struct MemoryInner {
    entries: HashMap<String, Entry>,
    last_sweep: Instant,
}

/// Process-local store for development and tests.
///
/// Not shared between instances. Expired keys are hidden immediately and
/// dropped in a sweep at most once per `sweep_interval`.
#[derive(Debug)]
pub struct MemoryKvStore {
    inner: Mutex<MemoryInner>,
    sweep_interval: Duration,
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl MemoryKvStore {
    pub fn new(sweep_interval: Duration) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            sweep_interval,
        }
    }

    /// Number of stored keys, expired ones included until the next sweep.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut HashMap<String, Entry>, Instant) -> T) -> T {
        let now = Instant::now();
        let mut inner = self.lock();
        if now.duration_since(inner.last_sweep) >= self.sweep_interval {
            let before = inner.entries.len();
            inner.entries.retain(|_, e| !e.is_expired(now));
            inner.last_sweep = now;
            debug!(removed = before - inner.entries.len(), "swept expired KV entries");
        }
        f(&mut inner.entries, now)
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn incr(&self, key: &str) -> KvResult<i64> {
        self.with_inner(|entries, now| -> KvResult<i64> {
            let live = entries
                .get(key)
                .filter(|e| !e.is_expired(now))
                .map(|e| e.value.clone());
            let next = match live {
                Some(value) => {
                    let current: i64 = value.parse().map_err(|_| {
                        KvError::invalid_argument(format!("value at '{key}' is not an integer"))
                    })?;
                    current + 1
                }
                None => 1,
            };
            if next > 1 {
                if let Some(entry) = entries.get_mut(key) {
                    entry.value = next.to_string();
                }
            } else {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: next.to_string(),
                        expires_at: None,
                    },
                );
            }
            Ok(next)
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<()> {
        self.with_inner(|entries, now| {
            if let Some(e) = entries.get_mut(key) {
                if !e.is_expired(now) {
                    e.expires_at = Some(now + ttl);
                }
            }
            Ok(())
        })
    }

    async fn ttl(&self, key: &str) -> KvResult<Option<Duration>> {
        self.with_inner(|entries, now| {
            Ok(entries
                .get(key)
                .filter(|e| !e.is_expired(now))
                .and_then(|e| e.expires_at)
                .map(|at| at.duration_since(now)))
        })
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        self.with_inner(|entries, now| {
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: Some(now + ttl),
                },
            );
            Ok(())
        })
    }

    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        self.with_inner(|entries, now| {
            Ok(entries
                .get(key)
                .filter(|e| !e.is_expired(now))
                .map(|e| e.value.clone()))
        })
    }

    async fn delete(&self, key: &str) -> KvResult<bool> {
        self.with_inner(|entries, now| {
            Ok(entries.remove(key).is_some_and(|e| !e.is_expired(now)))
        })
    }

    async fn ping(&self) -> KvResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_memory_incr_and_expire() {
        let store = MemoryKvStore::default();
        assert_eq!(store.incr("rl:a").await.unwrap(), 1);
        store.expire("rl:a", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.incr("rl:a").await.unwrap(), 2);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.incr("rl:a").await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_ttl() {
        let store = MemoryKvStore::default();
        assert_eq!(store.ttl("rl:b").await.unwrap(), None);
        store.incr("rl:b").await.unwrap();
        assert_eq!(store.ttl("rl:b").await.unwrap(), None);

        store.expire("rl:b", Duration::from_secs(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(store.ttl("rl:b").await.unwrap(), Some(Duration::from_secs(6)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_set_ex_and_get() {
        let store = MemoryKvStore::default();
        store.set_ex("csrf:x", "1", Duration::from_secs(5)).await.unwrap();
        assert_eq!(store.get("csrf:x").await.unwrap().as_deref(), Some("1"));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(store.get("csrf:x").await.unwrap().is_none());
        assert!(!store.delete("csrf:x").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_sweep_drops_expired() {
        let store = MemoryKvStore::new(Duration::from_secs(30));
        for i in 0..5 {
            store
                .set_ex(&format!("k{i}"), "v", Duration::from_secs(1))
                .await
                .unwrap();
        }
        assert_eq!(store.len(), 5);

        tokio::time::advance(Duration::from_secs(31)).await;
        store.get("unrelated").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_memory_incr_rejects_non_integer() {
        let store = MemoryKvStore::default();
        store.set_ex("k", "abc", Duration::from_secs(60)).await.unwrap();
        assert!(matches!(
            store.incr("k").await,
            Err(KvError::InvalidArgument(_))
        ));
    }
}
