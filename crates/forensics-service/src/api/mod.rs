pub mod routes;

use crate::state::ForensicsServiceState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Build the API router
pub fn router(state: ForensicsServiceState) -> Router {
    Router::new()
        // Health and metrics endpoints
        .route("/healthz", get(routes::healthz))
        .route("/readyz", get(routes::readyz))
        .route("/metrics", get(routes::metrics))
        // Queue endpoints
        .route(
            "/v1/items",
            get(routes::list_items)
                .post(routes::enqueue_item)
                .delete(routes::clear_items),
        )
        .route(
            "/v1/items/:id",
            get(routes::get_item).delete(routes::remove_item),
        )
        .route("/v1/items/:id/run", post(routes::run_item))
        .route("/v1/batch", post(routes::run_batch))
        // Settings and history
        .route(
            "/v1/settings",
            get(routes::get_settings).put(routes::update_settings),
        )
        .route(
            "/v1/history",
            get(routes::list_history).delete(routes::clear_history),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
