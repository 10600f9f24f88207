use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Extension},
    http::StatusCode,
    response::IntoResponse,
    routing::{any, get},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::resource::MAX_BODY_BYTES;
use crate::state::AppState;

/// Build the primary axum router with the provided shared application state.
///
/// Everything is mounted under `/api`: the fixed health and task routes plus
/// `/{resource}` and `/{resource}/{pk}` for every registered resource.
pub fn build_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route(
            "/tasks/{uuid}",
            get(handlers::tasks::status).delete(handlers::tasks::forget),
        )
        .route("/{resource}", any(handlers::resources::list))
        .route("/{resource}/{pk}", any(handlers::resources::detail))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(Extension(state));

    Router::new()
        .nest("/api", router)
        .layer(TraceLayer::new_for_http())
}

async fn health_handler() -> impl IntoResponse {
    // Liveness: always return 200 OK when process is alive.
    (StatusCode::OK, "OK")
}

async fn ready_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    if state.task_queue.task_names().await.is_empty() {
        (StatusCode::SERVICE_UNAVAILABLE, "no tasks registered")
    } else {
        (StatusCode::OK, "OK")
    }
}
