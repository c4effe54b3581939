//! Resume blob storage.
//!
//! This crate provides:
//! - Object upload, deletion and presigned download URLs on Cloudflare R2
//! - An in-memory object store for tests and local development
//! - The resume key layout

pub mod client;
pub mod error;
pub mod store;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use store::{resume_key, MemoryObjectStore, ObjectStore, StoredObject};
