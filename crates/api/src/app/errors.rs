use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use pollbridge_core::PollError;

use crate::app::dto::Problem;

pub fn poll_error_to_response(err: PollError) -> Response {
    match err {
        PollError::UnknownJob { .. } => problem(StatusCode::NOT_FOUND, err.to_string()),
        PollError::InfrastructureUnavailable(e) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", e.to_string())
        }
        PollError::Spawn(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "spawn_error", msg),
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// `application/problem+json` response.
pub fn problem(status: StatusCode, detail: impl Into<String>) -> Response {
    let body = Problem {
        kind: "about:blank".to_string(),
        title: status.canonical_reason().unwrap_or("Error").to_string(),
        status: status.as_u16(),
        detail: detail.into(),
    };
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/problem+json"),
    );
    response
}
