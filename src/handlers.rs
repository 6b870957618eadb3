use std::{convert::Infallible, time::Duration};

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use serde_json::json;
use tokio_stream::{
    Stream, StreamExt,
    wrappers::{BroadcastStream, errors::BroadcastStreamRecvError},
};

use crate::{
    auth::{self, Identity},
    config::AppConfig,
    directory::{DirectoryState, check_credentials},
    error::{ApiError, ErrorBody},
    models::{BroadcastReceipt, BroadcastRequest, EmployeeProfile, LoginRequest, LoginResponse},
    notify::NotificationBridge,
};

pub const WELCOME_TEXT: &str = "Welcome to the E-Commerce Backend!";

/// Body shape errors (missing fields, wrong types) surface the same way as
/// malformed JSON: a 400 before any work is done.
fn extract_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::MalformedBody(rejection.body_text()))
}

// --- Public ---

/// welcome
///
/// [Public Route] `GET /`. Fixed greeting text.
#[utoipa::path(get, path = "/", responses((status = 200, description = "Welcome text", body = String)))]
pub async fn welcome() -> &'static str {
    WELCOME_TEXT
}

/// not_found
///
/// Terminal handler for every request no route matched.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// login
///
/// [Public Route] `POST /api/employee/login`. Carved out of the protected employee
/// prefix, so it is reached without a token.
///
/// Unknown email, deactivated employee and wrong password are indistinguishable to
/// the caller, in body and in cost: each runs one password verification. A
/// successful login is announced as `employee.logged_in`.
#[utoipa::path(
    post,
    path = "/api/employee/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = LoginResponse),
        (status = 400, description = "Malformed body", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(directory): State<DirectoryState>,
    State(config): State<AppConfig>,
    State(notifier): State<NotificationBridge>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let request = extract_json(payload)?;

    let candidate = directory.find_by_email(request.email.trim()).await?;
    let employee = check_credentials(candidate, request.password)
        .await
        .map_err(|e| ApiError::Internal(format!("password check: {e}")))?
        .ok_or_else(|| {
            tracing::info!(email = %request.email, "login rejected");
            ApiError::InvalidCredentials
        })?;

    let (token, expires_at) = auth::issue_token(&employee, &config)?;
    tracing::info!(employee = %employee.id, role = %employee.role, "employee logged in");

    notifier.emit(
        "employee.logged_in",
        json!({ "id": employee.id, "role": employee.role }),
    );

    Ok(Json(LoginResponse {
        token,
        expires_at,
        employee: employee.profile(),
    }))
}

/// event_stream
///
/// [Public Route] `GET /api/events`. Server-Sent Events feed of every notification
/// broadcast through the bridge: the SSE event name is the notification name, the
/// data is its JSON payload.
///
/// Listeners that fall behind the channel buffer skip the missed events.
#[utoipa::path(
    get,
    path = "/api/events",
    responses(
        (status = 200, description = "text/event-stream of notifications"),
        (status = 503, description = "Channel not bound", body = ErrorBody)
    )
)]
pub async fn event_stream(
    State(notifier): State<NotificationBridge>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let receiver = notifier.subscribe().ok_or(ApiError::ChannelUnavailable)?;
    tracing::debug!("real-time listener connected");

    let stream = BroadcastStream::new(receiver).filter_map(|item| match item {
        Ok(notification) => match Event::default()
            .event(notification.name.as_str())
            .json_data(&notification.payload)
        {
            Ok(event) => Some(Ok(event)),
            Err(err) => {
                tracing::warn!(event = %notification.name, error = %err, "unencodable notification skipped");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "real-time listener lagged; events dropped");
            None
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

// --- Employee (protected) ---

/// me
///
/// [Employee Route] `GET /api/employee/me`. Profile of the authenticated caller.
#[utoipa::path(
    get,
    path = "/api/employee/me",
    responses(
        (status = 200, description = "Caller profile", body = EmployeeProfile),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn me(
    identity: Identity,
    State(directory): State<DirectoryState>,
) -> Result<Json<EmployeeProfile>, ApiError> {
    // The entry can disappear or be deactivated between authentication and this lookup.
    let employee = directory
        .find_by_id(identity.id)
        .await?
        .filter(|employee| employee.active)
        .ok_or(ApiError::Unauthenticated)?;
    Ok(Json(employee.profile()))
}

// --- Admin (protected) ---

/// list_employees
///
/// [Admin Route] `GET /api/admin/employees`. Every directory entry, by name.
#[utoipa::path(
    get,
    path = "/api/admin/employees",
    responses(
        (status = 200, description = "All employees", body = [EmployeeProfile]),
        (status = 403, description = "Not an admin", body = ErrorBody)
    )
)]
pub async fn list_employees(
    State(directory): State<DirectoryState>,
) -> Result<Json<Vec<EmployeeProfile>>, ApiError> {
    let employees = directory.list().await?;
    Ok(Json(employees.iter().map(|e| e.profile()).collect()))
}

/// broadcast
///
/// [Admin Route] `POST /api/admin/notifications`. Pushes a named notification to
/// all real-time listeners. Answers 202 even when nobody is listening or the
/// channel is unbound; `delivered_to` says how many listeners received it.
#[utoipa::path(
    post,
    path = "/api/admin/notifications",
    request_body = BroadcastRequest,
    responses(
        (status = 202, description = "Handed to the channel", body = BroadcastReceipt),
        (status = 400, description = "Malformed body", body = ErrorBody),
        (status = 403, description = "Not an admin", body = ErrorBody)
    )
)]
pub async fn broadcast(
    identity: Identity,
    State(notifier): State<NotificationBridge>,
    payload: Result<Json<BroadcastRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BroadcastReceipt>), ApiError> {
    let request = extract_json(payload)?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::MalformedBody("notification name is empty".into()));
    }

    let delivered_to = notifier.emit(name, request.payload);
    tracing::info!(admin = %identity.id, event = name, delivered_to, "admin broadcast");

    Ok((StatusCode::ACCEPTED, Json(BroadcastReceipt { delivered_to })))
}
