use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Gateway endpoints outside the `/api/<group>` prefixes. None of them is covered
/// by the route table, so the access gate lets them through untouched.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Fixed welcome text.
        .route("/", get(handlers::welcome))
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /api/events
        // Server-Sent Events feed of the notification channel.
        .route("/api/events", get(handlers::event_stream))
}
