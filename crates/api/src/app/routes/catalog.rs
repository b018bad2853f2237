use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::{debug, error};

use pollbridge_core::{JobId, Outcome};

use crate::app::PendingStatus;
use crate::app::dto::{PendingResponse, PollParams};
use crate::app::errors;
use crate::app::services::AppServices;

/// Namespace of catalog lookups in the envelope store.
pub const NAMESPACE: &str = "catalog.product";

/// Header carrying the job id on pending responses.
pub const JOB_ID_HEADER: &str = "x-job-id";

pub fn router() -> Router {
    Router::new().route("/products/:id", get(get_product))
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(product_id): Path<String>,
    Query(params): Query<PollParams>,
) -> Response {
    let raw_job = params.job.clone().unwrap_or_default();
    let request = match params.into_request_view() {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "malformed job id");
            return errors::problem(StatusCode::NOT_FOUND, format!("Unknown job id: {raw_job}"));
        }
    };

    // The coordinator blocks while it waits, so keep it off the async workers.
    let worker = Arc::clone(&services);
    let lookup_id = product_id.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let catalog = worker.catalog.clone();
        worker
            .coordinator
            .handle(NAMESPACE, move || Ok(catalog.find(&lookup_id)), &request)
    })
    .await;

    let outcome = match joined {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => return errors::poll_error_to_response(e),
        Err(e) => {
            error!(error = %e, "coordinator task failed");
            return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", e.to_string());
        }
    };

    match outcome {
        Outcome::Ready(Some(product)) => (StatusCode::OK, Json(product)).into_response(),
        Outcome::Ready(None) => errors::problem(StatusCode::NOT_FOUND, format!("Unknown product {product_id}")),
        Outcome::Pending { job_id } => pending_response(services.pending_status, job_id),
    }
}

fn pending_response(status: PendingStatus, job_id: JobId) -> Response {
    let header = HeaderValue::from_str(job_id.as_str()).ok();
    let mut response = match status {
        PendingStatus::Accepted => (StatusCode::ACCEPTED, Json(PendingResponse::new(job_id))).into_response(),
        PendingStatus::NoContent => StatusCode::NO_CONTENT.into_response(),
    };
    if let Some(value) = header {
        response.headers_mut().insert(JOB_ID_HEADER, value);
    }
    response
}
