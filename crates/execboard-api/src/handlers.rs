//! Request handlers.

pub mod admin;
pub mod ai;
pub mod applications;
pub mod auth;
pub mod candidates;
pub mod employers;
pub mod health;
pub mod jobs;
pub mod messages;
pub mod notifications;
pub mod payments;
pub mod uploads;
pub mod webhooks;

pub use health::{health, ready};
