use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use form_autofill::auth::CallerIdentity;
use form_autofill::cli::config::MapperConfig;
use form_autofill::mapper::error::MapperError;
use form_autofill::mapper::inference::{GeminiBackend, TextInference};
use form_autofill::mapper::mapper::FieldMapper;
use form_autofill::mapper::mapping_model::{FieldMapping, StudentData};

mod common;

const GENERATE_PATH: &str = "/models/gemini-2.0-flash:generateContent";

fn config(server: &MockServer) -> MapperConfig {
    MapperConfig {
        base_url: server.uri(),
        api_key: Some("test-key".to_string()),
        timeout_ms: 2_000,
        retry_backoff_ms: 10,
        ..MapperConfig::default()
    }
}

fn model_reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [
            {"content": {"role": "model", "parts": [{"text": text}]}}
        ]
    })
}

#[test]
fn backend_needs_an_api_key() {
    let config = MapperConfig {
        api_key: Some("   ".to_string()),
        ..MapperConfig::default()
    };
    // A blank configured key shadows the environment and is rejected.
    assert!(matches!(
        GeminiBackend::new(config),
        Err(MapperError::NotConfigured(_))
    ));
}

#[tokio::test]
async fn sends_json_mode_request_with_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "generationConfig": {"responseMimeType": "application/json"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_reply("[]")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(config(&server)).unwrap();
    let text = backend.infer_text("map these fields").await.unwrap();
    assert_eq!(text, "[]");
}

#[tokio::test]
async fn server_errors_are_retried_then_succeed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_reply("[1]")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(config(&server)).unwrap();
    assert_eq!(backend.infer_text("p").await.unwrap(), "[1]");
}

#[tokio::test]
async fn exhausted_retries_report_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(config(&server)).unwrap();
    let err = backend.infer_text("p").await.unwrap_err();

    assert!(err.to_string().starts_with("AI service unavailable after 3 attempt(s)"));
    match err {
        MapperError::Unavailable { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected Unavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn timeouts_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(model_reply("[]"))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(MapperConfig {
        timeout_ms: 100,
        max_retries: 1,
        ..config(&server)
    })
    .unwrap();

    let err = backend.infer_text("p").await.unwrap_err();
    match err {
        MapperError::Unavailable { attempts, reason } => {
            assert_eq!(attempts, 2);
            assert!(reason.contains("timed out"), "reason was: {}", reason);
        }
        other => panic!("expected Unavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": {"code": 400, "message": "API key not valid"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(config(&server)).unwrap();
    match backend.infer_text("p").await.unwrap_err() {
        MapperError::Upstream { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "API key not valid");
        }
        other => panic!("expected Upstream, got {:?}", other),
    }
}

#[tokio::test]
async fn empty_candidates_are_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(config(&server)).unwrap();
    assert!(matches!(
        backend.infer_text("p").await,
        Err(MapperError::Parse(_))
    ));
}

#[tokio::test]
async fn field_mapper_over_gemini_filters_fenced_reply() {
    let server = MockServer::start().await;
    let reply = "```json\n[{\"selector\":\"#name\",\"value\":\"Jane Doe\",\"confidence\":0.95},\
                 {\"selector\":\"#gpa\",\"value\":\"3.9\",\"confidence\":0.4}]\n```";
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_reply(reply)))
        .mount(&server)
        .await;

    let backend = Arc::new(GeminiBackend::new(config(&server)).unwrap());
    let mapper = FieldMapper::new(backend);
    let caller = CallerIdentity::new("counsellor-1");

    let mappings = mapper
        .map_context(
            Some(&caller),
            "1. selector: #name | type: input (text)",
            &StudentData(common::pages::student()),
        )
        .await
        .unwrap();

    assert_eq!(mappings, vec![FieldMapping::new("#name", "Jane Doe", Some(0.95))]);
}
