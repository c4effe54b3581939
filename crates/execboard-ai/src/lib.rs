//! AI assistance for ExecBoard.
//!
//! This crate provides:
//! - A Gemini `generateContent` client with timeout and bounded retry
//! - JSON extraction from free-form model output
//! - Resume analysis, candidate/job matching and job description drafting

pub mod analysis;
pub mod client;
pub mod error;
pub mod extract;
pub mod retry;

pub use analysis::{
    analyze_resume, draft_job_description, generate_structured, match_job, JobDescriptionDraft,
    JobDescriptionInput, JobMatch, JobMatchInput, ResumeAnalysis, ResumeAnalysisInput,
};
pub use client::{GeminiClient, GeminiConfig, LanguageModel};
pub use error::{AiError, AiResult};
pub use extract::extract_json_object;
pub use retry::{with_retry, RetryConfig};
