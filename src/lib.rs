use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware as axum_middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod roles;
pub mod route_table;

// Gateway endpoints split by tier, plus the standard route table.
pub mod routes;
use routes::{RouteGroups, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use directory::{DirectoryState, InMemoryDirectory, PostgresDirectory};
pub use notify::NotificationBridge;
pub use route_table::RouteTableError;

/// ApiDoc
///
/// OpenAPI document for the endpoints the gateway owns, served at
/// `/api-docs/openapi.json`. The business groups mounted through [`RouteGroups`]
/// document themselves.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::welcome, handlers::login, handlers::event_stream,
        handlers::me, handlers::list_employees, handlers::broadcast
    ),
    components(
        schemas(
            models::EmployeeProfile, models::LoginRequest, models::LoginResponse,
            models::BroadcastRequest, models::BroadcastReceipt, error::ErrorBody,
            roles::Role, notify::Notification,
        )
    ),
    tags(
        (name = "storefront-gateway", description = "E-commerce backend HTTP entry point")
    )
)]
struct ApiDoc;

/// AppState
///
/// The shared, cheaply cloneable container handed to every handler. The
/// notification bridge travels here instead of living in a global, so whoever
/// builds the state decides which channel handlers broadcast on.
#[derive(Clone)]
pub struct AppState {
    /// Employee lookup for authentication and login.
    pub directory: DirectoryState,
    /// Broadcast handle for real-time notifications.
    pub notifier: NotificationBridge,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for DirectoryState {
    fn from_ref(app_state: &AppState) -> DirectoryState {
        app_state.directory.clone()
    }
}

impl FromRef<AppState> for NotificationBridge {
    fn from_ref(app_state: &AppState) -> NotificationBridge {
        app_state.notifier.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the request pipeline around the route table. From the outside in:
///
/// 1. CORS, every origin allowed.
/// 2. Request id + access log: one span and one response line per request, the
///    `x-request-id` echoed on every response (error responses included).
/// 3. Panic containment: a panicking handler becomes the sanitized 500.
/// 4. JSON decoding: malformed `application/json` bodies stop here with a 400.
/// 5. Access gate: authentication and role gate for protected prefixes.
/// 6. Dispatch, with the 404 handler for anything unmatched.
///
/// Fails only when the route table is ambiguous or a supplied group redefines a
/// built-in route.
pub fn create_router(state: AppState, groups: RouteGroups) -> Result<Router, RouteTableError> {
    let (api, policy) = routes::route_table(groups)?.build()?;

    let gate = middleware::GateState {
        policy,
        app: state.clone(),
    };
    let body_limit = state.config.body_limit_bytes;

    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(api)
        // Unknown path and unknown method on a known path answer alike.
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::not_found)
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(gate, middleware::access_gate))
        .layer(axum_middleware::from_fn_with_state(body_limit, middleware::json_body))
        .layer(CatchPanicLayer::custom(error::handle_panic))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors);

    Ok(app)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the request id, so every log line
/// of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
