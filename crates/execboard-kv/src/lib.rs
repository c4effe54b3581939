//! Shared counters and short-lived tokens.
//!
//! This crate provides:
//! - A small `KvStore` abstraction with Redis and in-process backends
//! - Fixed-window rate limiting that fails open
//! - CSRF token issue/verify that fails closed

pub mod csrf;
pub mod error;
pub mod rate_limit;
pub mod store;

pub use csrf::{CsrfStore, CSRF_TOKEN_TTL};
pub use error::{KvError, KvResult};
pub use rate_limit::{RateDecision, RateLimiter, RatePolicy};
pub use store::{KvStore, MemoryKvStore, RedisConfig, RedisKvStore};
