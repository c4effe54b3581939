//! Axum HTTP API server for ExecBoard.
//!
//! This crate provides:
//! - The request pipeline: rate limiting, session and role gate, validation
//! - Job, application, profile, messaging and notification routes
//! - Resume uploads, AI assistance and Stripe checkout with webhooks
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;
pub mod validation;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;
pub use routes::create_router;
pub use state::AppState;
