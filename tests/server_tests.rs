use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{header as header_eq, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use form_autofill::auth::{StaticSessions, bearer_token};
use form_autofill::mapper::error::MapperError;
use form_autofill::mapper::inference::{MockTextInference, UnconfiguredBackend};
use form_autofill::mapper::mapper::{FieldMapper, MappingService};
use form_autofill::mapper::mapping_model::StudentData;
use form_autofill::mapper::remote::RemoteMapper;
use form_autofill::scanner::scanner::scan_page;
use form_autofill::server::routes::{AppState, FIELD_MAPPING_PATH, build_router};

mod common;

use common::pages::{application_form, student};

const TOKEN: &str = "session-abc";

fn router_with(backend: Arc<dyn form_autofill::mapper::inference::TextInference>) -> Router {
    let sessions = HashMap::from([(TOKEN.to_string(), "counsellor-1".to_string())]);
    build_router(Arc::new(AppState {
        mapper: Arc::new(FieldMapper::new(backend)),
        sessions: Arc::new(StaticSessions::new(sessions)),
        model_configured: true,
    }))
}

fn mapping_request(token: Option<&str>, body: String) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(FIELD_MAPPING_PATH)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn valid_body() -> String {
    json!({
        "html_context": "1. selector: #name | type: input (text) | label: \"Full Name\"",
        "student_data": student(),
    })
    .to_string()
}

// =========================================================================
// Router
// =========================================================================

#[tokio::test]
async fn health_reports_model_configuration() {
    let router = router_with(Arc::new(MockTextInference::new("[]")));
    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"status": "ok", "model_configured": true})
    );
}

#[tokio::test]
async fn missing_or_unknown_token_is_401() {
    let backend = Arc::new(MockTextInference::new("[]"));

    for token in [None, Some("wrong-token")] {
        let response = router_with(backend.clone())
            .oneshot(mapping_request(token, valid_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "Unauthorized");
    }
    assert!(backend.prompts().is_empty());
}

#[tokio::test]
async fn missing_fields_or_bad_json_is_400() {
    let router = router_with(Arc::new(MockTextInference::new("[]")));

    let bodies = [
        json!({"student_data": student()}).to_string(),
        json!({"html_context": "1. selector: #name"}).to_string(),
        json!({"html_context": "", "student_data": {"a": 1}}).to_string(),
        json!({"html_context": "  \n ", "student_data": student()}).to_string(),
        json!({"html_context": "x", "student_data": "not an object"}).to_string(),
        "{oops".to_string(),
    ];

    for body in bodies {
        let response = router
            .clone()
            .oneshot(mapping_request(Some(TOKEN), body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        assert!(json_body(response).await["error"].is_string());
    }
}

#[tokio::test]
async fn valid_request_returns_filtered_mapping() {
    let reply = r##"[{"selector":"#name","value":"Jane Doe","confidence":0.95},
                    {"selector":"#nickname","value":"JD","confidence":0.3}]"##;
    let backend = Arc::new(MockTextInference::new(reply));
    let router = router_with(backend.clone());

    let response = router
        .oneshot(mapping_request(Some(TOKEN), valid_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let mapping = body["mapping"].as_array().unwrap();
    assert_eq!(mapping.len(), 1);
    assert_eq!(mapping[0]["selector"], "#name");
    assert_eq!(mapping[0]["value"], "Jane Doe");
    assert_eq!(backend.prompts().len(), 1);
}

#[tokio::test]
async fn unparseable_model_reply_is_500_with_empty_mapping() {
    let router = router_with(Arc::new(MockTextInference::new("no json here")));

    let response = router
        .oneshot(mapping_request(Some(TOKEN), valid_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["mapping"], json!([]));
    assert!(body["error"].as_str().unwrap().contains("parse"));
}

#[tokio::test]
async fn unconfigured_model_is_500() {
    let router = router_with(Arc::new(UnconfiguredBackend {
        reason: "GEMINI_API_KEY is not set".to_string(),
    }));

    let response = router
        .oneshot(mapping_request(Some(TOKEN), valid_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["mapping"], json!([]));
}

#[test]
fn bearer_token_parsing() {
    assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
    assert_eq!(bearer_token(Some("bearer   abc ")), Some("abc"));
    assert_eq!(bearer_token(Some("Basic abc")), None);
    assert_eq!(bearer_token(Some("Bearer ")), None);
    assert_eq!(bearer_token(None), None);
}

// =========================================================================
// Remote mapper client
// =========================================================================

#[tokio::test]
async fn remote_mapper_posts_context_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FIELD_MAPPING_PATH))
        .and(header_eq("authorization", "Bearer session-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "mapping": [
                {"selector": "#name", "value": "Jane Doe", "confidence": 0.9},
                {"selector": "#country", "value": "Canada", "confidence": 0.2}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let remote = RemoteMapper::new(
        &format!("{}{}", server.uri(), FIELD_MAPPING_PATH),
        Some(TOKEN.to_string()),
        Duration::from_secs(5),
    )
    .unwrap();

    let mut doc = application_form();
    let elements = scan_page(&mut doc).elements;
    let mappings = remote
        .map_fields(&elements, &StudentData(student()))
        .await
        .unwrap();

    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].selector, "#name");
}

#[tokio::test]
async fn remote_mapper_maps_status_codes_to_errors() {
    let cases = [
        (401, "unauthorized"),
        (400, "invalid"),
        (500, "upstream"),
    ];

    for (status, kind) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(status).set_body_json(json!({"error": "nope", "mapping": []})),
            )
            .mount(&server)
            .await;

        let remote = RemoteMapper::new(&server.uri(), None, Duration::from_secs(5)).unwrap();
        let err = remote
            .map_fields(&[], &StudentData(student()))
            .await
            .unwrap_err();

        let matched = match kind {
            "unauthorized" => matches!(err, MapperError::Unauthorized(ref m) if m == "nope"),
            "invalid" => matches!(err, MapperError::InvalidRequest(_)),
            _ => matches!(err, MapperError::Upstream { status: 500, .. }),
        };
        assert!(matched, "status {} gave {:?}", status, err);
    }
}

#[tokio::test]
async fn remote_mapper_against_live_router() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let reply = r##"[{"selector":"#name","value":"Jane Doe","confidence":0.99}]"##;
    let router = router_with(Arc::new(MockTextInference::new(reply)));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let endpoint = format!("http://{}{}", addr, FIELD_MAPPING_PATH);
    let mut doc = application_form();
    let elements = scan_page(&mut doc).elements;

    let authorized = RemoteMapper::new(&endpoint, Some(TOKEN.to_string()), Duration::from_secs(5)).unwrap();
    let mappings = authorized
        .map_fields(&elements, &StudentData(student()))
        .await
        .unwrap();
    assert_eq!(mappings[0].value, "Jane Doe");

    let anonymous = RemoteMapper::new(&endpoint, None, Duration::from_secs(5)).unwrap();
    let err = anonymous
        .map_fields(&elements, &StudentData(student()))
        .await
        .unwrap_err();
    assert!(matches!(err, MapperError::Unauthorized(_)));
}
