//! AI error types.

use thiserror::Error;

pub type AiResult<T> = Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI provider not configured")]
    NotConfigured,

    #[error("AI request timed out after {0} ms")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("AI provider returned HTTP {status}: {body}")]
    Http {
        status: u16,
        body: String,
        /// Retry-After hint from the provider
        retry_after_ms: Option<u64>,
    },

    #[error("AI response contained no text")]
    EmptyResponse,

    #[error("AI response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("AI response has unexpected shape: {0}")]
    UnexpectedShape(String),
}

impl AiError {
    /// Transient errors are worth retrying: 429, 5xx, network failures and timeouts.
    pub fn is_transient(&self) -> bool {
        match self {
            AiError::Timeout(_) | AiError::Network(_) => true,
            AiError::Http { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            AiError::Http { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AiError::NotConfigured => "not_configured",
            AiError::Timeout(_) => "timeout",
            AiError::Network(_) => "network",
            AiError::Http { .. } => "http",
            AiError::EmptyResponse => "empty",
            AiError::InvalidJson(_) => "invalid_json",
            AiError::UnexpectedShape(_) => "unexpected_shape",
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AiError::Timeout(0)
        } else {
            AiError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> AiError {
        AiError::Http {
            status,
            body: String::new(),
            retry_after_ms: None,
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(http(429).is_transient());
        assert!(http(503).is_transient());
        assert!(AiError::Timeout(30_000).is_transient());
        assert!(AiError::Network("connection reset".into()).is_transient());

        assert!(!http(400).is_transient());
        assert!(!http(403).is_transient());
        assert!(!AiError::InvalidJson("x".into()).is_transient());
        assert!(!AiError::NotConfigured.is_transient());
    }
}
