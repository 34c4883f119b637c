use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// Build the query router. Data endpoints live under `/api/v{api_version}`.
pub fn create_router(state: AppState, api_version: u32) -> Router {
    let api_routes = Router::new()
        .route("/all", get(handlers::all))
        .route("/seeds", get(handlers::seeds))
        .route("/gear", get(handlers::gear))
        .route("/eggs", get(handlers::eggs))
        .route("/cosmetics", get(handlers::cosmetics))
        .route("/events", get(handlers::events))
        .route("/weather", get(handlers::weather))
        .route("/status", get(handlers::status))
        .route("/fruits", get(handlers::fruits));

    Router::new()
        .route("/", get(handlers::root))
        .nest(&format!("/api/v{api_version}"), api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
