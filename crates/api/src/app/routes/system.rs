use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Runner counters, plus envelope store counters when the backend keeps them.
pub async fn stats(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    let runner = services.runner_stats();
    match services.store_stats() {
        Some(store) => Json(serde_json::json!({ "store": store, "runner": runner })),
        None => Json(serde_json::json!({ "runner": runner })),
    }
}
