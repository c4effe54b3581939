//! Relational persistence for ExecBoard.
//!
//! This crate provides:
//! - Repository traits for users, profiles, jobs, applications, messages,
//!   notifications, payments and subscriptions
//! - A Postgres implementation over `sqlx` with idempotent schema bootstrap
//! - An in-memory implementation for tests and local development

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repos;

pub use error::{DbError, DbResult};
pub use memory::MemoryStore;
pub use postgres::{create_pool, run_migrations, PgStore};
pub use repos::{
    ApplicationRepository, JobRepository, JobTransition, LinkedProfile, MessageRepository,
    NotificationRepository, PaymentRepository, ProfileRepository, Repositories, StoreHealth,
    UserRepository,
};
