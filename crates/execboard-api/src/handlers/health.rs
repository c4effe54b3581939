//! Liveness and readiness probes.

use std::future::Future;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

/// Always 200 while the process is serving.
pub async fn health() -> Json<Liveness> {
    Json(Liveness {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Probe {
    Ok,
    Error,
    Configured,
    Disabled,
}

#[derive(Serialize)]
pub struct Dependency {
    pub status: Probe,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Dependency {
    fn flag(enabled: bool) -> Self {
        Self {
            status: if enabled { Probe::Configured } else { Probe::Disabled },
            latency_ms: None,
            error: None,
        }
    }

    fn failed(&self) -> bool {
        self.status == Probe::Error
    }
}

/// Run one connectivity check and time it.
async fn probe<F, E>(check: F) -> Dependency
where
    F: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let started = Instant::now();
    match check.await {
        Ok(()) => Dependency {
            status: Probe::Ok,
            latency_ms: Some(started.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => Dependency {
            status: Probe::Error,
            latency_ms: None,
            error: Some(e.to_string()),
        },
    }
}

#[derive(Serialize)]
pub struct Readiness {
    pub status: &'static str,
    pub database: Dependency,
    pub kv: Dependency,
    pub storage: Dependency,
    pub ai: Dependency,
    pub payments: Dependency,
}

/// Readiness probe.
///
/// Only the database gates readiness. A failing KV store or object store is
/// reported as `degraded`: rate limiting fails open and uploads answer 503.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let database = probe(state.repos.health.ping()).await;
    let kv = probe(state.kv.ping()).await;
    let storage = match &state.storage {
        Some(storage) => probe(storage.check_connectivity()).await,
        None => Dependency::flag(false),
    };

    let (code, status) = if database.failed() {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    } else if kv.failed() || storage.failed() {
        (StatusCode::OK, "degraded")
    } else {
        (StatusCode::OK, "ready")
    };

    (
        code,
        Json(Readiness {
            status,
            database,
            kv,
            storage,
            ai: Dependency::flag(state.ai.is_some()),
            payments: Dependency::flag(state.stripe.is_some()),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_records_failure_text() {
        let dep = probe(async { Err::<(), _>("connection refused") }).await;
        assert!(dep.failed());
        assert_eq!(dep.error.as_deref(), Some("connection refused"));
        assert!(dep.latency_ms.is_none());

        let dep = probe(async { Ok::<(), String>(()) }).await;
        assert_eq!(dep.status, Probe::Ok);
        assert!(dep.latency_ms.is_some());
    }

    #[test]
    fn test_flag_serializes_lowercase() {
        let value = serde_json::to_value(Dependency::flag(true)).unwrap();
        assert_eq!(value["status"], "configured");
        assert!(value.get("error").is_none());
    }
}
