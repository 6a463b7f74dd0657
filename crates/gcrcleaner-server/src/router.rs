//! Router setup.

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::routes;
use crate::state::AppState;

/// Creates the service router.
pub fn service_router(state: AppState) -> Router {
    Router::new()
        .route("/http", post(routes::http::handle_http))
        .route("/pubsub", post(routes::pubsub::handle_pubsub))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}
