use axum::{http::StatusCode, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::handlers::{get_user_id, health_check, AppState};

/// Build the HTTP router.
///
/// Requests running past `request_timeout` are cut off with a plain 500,
/// the same status as any other resolution failure.
pub fn create_api_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/user-id", get(get_user_id))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::INTERNAL_SERVER_ERROR,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
