pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::matching::handlers as matching;
use crate::records::handlers as records;
use crate::state::AppState;

/// Multipart overhead allowed on top of the resume itself; the resume size
/// check happens in the handler.
const UPLOAD_BODY_LIMIT: usize = records::MAX_RESUME_BYTES + 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Matching core
        .route("/api/v1/evaluate", post(matching::handle_evaluate))
        .route("/api/v1/search", post(matching::handle_search))
        .route(
            "/api/v1/evaluations/:job_id",
            get(matching::handle_cached_evaluations),
        )
        // Records
        .route(
            "/api/v1/candidates",
            get(records::handle_list_candidates).post(records::handle_create_candidate),
        )
        .route(
            "/api/v1/candidates/:id",
            put(records::handle_update_candidate).delete(records::handle_delete_candidate),
        )
        .route(
            "/api/v1/jobs",
            get(records::handle_list_jobs).post(records::handle_create_job),
        )
        .route("/api/v1/jobs/:id", get(records::handle_get_job))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .with_state(state)
}
