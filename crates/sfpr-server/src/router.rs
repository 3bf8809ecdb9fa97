use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all registry endpoints.
pub fn build_router(state: AppState) -> Router {
    let max_body = state.registry.config().server.max_body_bytes;
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route(
            "/v1/submissions",
            get(handler::list_submissions_handler).post(handler::submit_handler),
        )
        .route("/v1/submissions/:id", get(handler::get_submission_handler))
        .route("/v1/submissions/:id/approve", post(handler::approve_handler))
        .route("/v1/submissions/:id/reject", post(handler::reject_handler))
        .route("/v1/submissions/:id/adjudicate", post(handler::adjudicate_handler))
        .route("/v1/conflicts", get(handler::conflicts_handler))
        .route("/v1/publish", post(handler::publish_handler))
        .route("/v1/index.json", get(handler::index_handler))
        .route("/v1/blobs/:file", get(handler::blob_handler))
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
