use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::auth::{SessionProvider, bearer_token};
use crate::mapper::mapper::FieldMapper;
use crate::mapper::mapping_model::StudentData;
use crate::mapper::remote::MappingRequest;

pub const FIELD_MAPPING_PATH: &str = "/api/field-mapping";

/// Shared state for the mapping endpoint.
pub struct AppState {
    pub mapper: Arc<FieldMapper>,
    pub sessions: Arc<dyn SessionProvider>,
    pub model_configured: bool,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(FIELD_MAPPING_PATH, post(field_mapping))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "field-mapping endpoint listening");
    axum::serve(listener, build_router(state)).await
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "model_configured": state.model_configured,
    }))
}

async fn field_mapping(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let token = bearer_token(
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
    );
    let caller = match token {
        Some(token) => state.sessions.authenticate(token).await,
        None => None,
    };
    let Some(caller) = caller else {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    };

    let request: MappingRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid request body: {}", e));
        }
    };

    let html_context = request.html_context.filter(|h| !h.trim().is_empty());
    let (Some(html_context), Some(student_data)) = (html_context, request.student_data) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing required fields: html_context and student_data",
        );
    };

    let student = StudentData(student_data);
    match state
        .mapper
        .map_context(Some(&caller), &html_context, &student)
        .await
    {
        Ok(mapping) => (StatusCode::OK, Json(json!({ "mapping": mapping }))).into_response(),
        Err(e) => {
            let status =
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            warn!(user = %caller.user_id, error = %e, "field mapping failed");
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                (status, Json(json!({ "error": e.to_string(), "mapping": [] }))).into_response()
            } else {
                error_response(status, &e.to_string())
            }
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
