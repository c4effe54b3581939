//! Gemini client tests against a mock HTTP server.

use std::time::Duration;

use execboard_ai::{
    analyze_resume, AiError, GeminiClient, GeminiConfig, LanguageModel, ResumeAnalysisInput,
    RetryConfig,
};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/models/gemini-2.5-flash:generateContent";

fn client_for(server: &MockServer) -> GeminiClient {
    let mut config = GeminiConfig::new("test-key");
    config.base_url = server.uri();
    config.timeout = Duration::from_millis(500);
    config.retry = RetryConfig {
        max_retries: 2,
        base_delay_ms: 1,
        max_delay_ms: 5,
    };
    GeminiClient::new(config).unwrap()
}

fn reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }], "role": "model" },
            "finishReason": "STOP"
        }]
    })
}

// ============================================================================
// Success paths
// ============================================================================

#[tokio::test]
async fn test_generate_sends_key_header_and_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply(r#"{"ok": true}"#)))
        .expect(1)
        .mount(&server)
        .await;

    let text = client_for(&server).generate("hello").await.unwrap();
    assert_eq!(text, r#"{"ok": true}"#);
}

#[tokio::test]
async fn test_analyze_resume_accepts_fenced_output() {
    let server = MockServer::start().await;
    let fenced = "```json\n{\"summary\": \"Health system COO\", \"strengths\": [\"operations\"], \"overall_score\": 88}\n```";
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply(fenced)))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let analysis = analyze_resume(
        &client,
        &ResumeAnalysisInput {
            resume_text: "COO at a 12-hospital system".to_string(),
            target_role: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(analysis.summary, "Health system COO");
    assert_eq!(analysis.overall_score, 88);
}

// ============================================================================
// Failure paths
// ============================================================================

#[tokio::test]
async fn test_service_unavailable_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("[1]")))
        .mount(&server)
        .await;

    let text = client_for(&server).generate("hi").await.unwrap();
    assert_eq!(text, "[1]");
}

#[tokio::test]
async fn test_bad_request_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid argument"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).generate("hi").await.unwrap_err();
    assert!(matches!(err, AiError::Http { status: 400, .. }));
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(reply("{}"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).generate("hi").await.unwrap_err();
    assert!(matches!(err, AiError::Timeout(_)));
}

#[tokio::test]
async fn test_empty_candidates_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let err = client_for(&server).generate("hi").await.unwrap_err();
    assert!(matches!(err, AiError::EmptyResponse));
}
