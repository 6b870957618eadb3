use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Built-in routes under `/api/admin`. The whole prefix is gated to the admin role
/// by the route table before any of these handlers runs.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/admin/employees
        // Directory listing for staff management.
        .route("/employees", get(handlers::list_employees))
        // POST /api/admin/notifications
        // Pushes a named notification to every real-time listener.
        .route("/notifications", post(handlers::broadcast))
}
