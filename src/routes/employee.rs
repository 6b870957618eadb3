use crate::{AppState, handlers, route_table::PublicRoute};
use axum::{Router, routing::get};

/// login_routes
///
/// Exact routes under `/api/employee` that stay public even though the prefix is
/// protected. Declared here, next to the protected group, and handed to the route
/// table together with it.
pub fn login_routes() -> Vec<PublicRoute> {
    vec![
        // POST /api/employee/login
        // Exchanges email and password for a session token.
        PublicRoute::post("/login", handlers::login),
    ]
}

/// employee_routes
///
/// Built-in routes for any authenticated staff member (admin, associate, cashier).
pub fn employee_routes() -> Router<AppState> {
    Router::new()
        // GET /api/employee/me
        // Profile of the caller.
        .route("/me", get(handlers::me))
}
