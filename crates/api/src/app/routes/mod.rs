use axum::{Router, routing::get};

pub mod catalog;
pub mod system;

/// Router for the coordinated endpoints, nested under `/api`.
pub fn router() -> Router {
    Router::new()
        .nest("/catalog", catalog::router())
        .route("/stats", get(system::stats))
}
