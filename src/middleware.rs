use axum::{
    body::{self, Body},
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use http_body_util::LengthLimitError;

use crate::{
    AppState,
    auth::{self, authorize_role},
    error::ApiError,
    route_table::{Access, AccessPolicy},
};

/// State of the access gate: the tier rules plus what authentication needs.
#[derive(Clone)]
pub struct GateState {
    pub policy: AccessPolicy,
    pub app: AppState,
}

/// access_gate
///
/// Runs for every request, matched or not. Paths the route table marks as open pass
/// straight through. Everything else must authenticate (401 otherwise) and then pass
/// the role gate (403 otherwise); the handler is never invoked on either failure.
/// On success the resolved `Identity` is stored in the request extensions.
pub async fn access_gate(
    State(gate): State<GateState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let required = match gate.policy.resolve(request.method(), request.uri().path()) {
        Access::Open => return Ok(next.run(request).await),
        Access::Restricted(roles) => roles,
    };

    let (mut parts, body) = request.into_parts();
    let identity = auth::authenticate(&parts, &gate.app.directory, &gate.app.config).await?;
    authorize_role(&identity, required)?;

    tracing::debug!(employee = %identity.id, role = %identity.role, "access granted");
    parts.extensions.insert(identity);
    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// json_body
///
/// Request pipeline stage that decodes JSON bodies before dispatch. A body declared
/// as `application/json` must fit in `limit` bytes (413 otherwise) and be
/// syntactically valid JSON (400 otherwise). An empty body passes. Other content
/// types are not inspected.
pub async fn json_body(
    State(limit): State<usize>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !is_json(request.headers()) {
        return Ok(next.run(request).await);
    }

    let declared_len = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > limit) {
        return Err(ApiError::PayloadTooLarge);
    }

    let (parts, body) = request.into_parts();
    let bytes = body::to_bytes(body, limit).await.map_err(|err| {
        let inner = err.into_inner();
        if inner.is::<LengthLimitError>() {
            ApiError::PayloadTooLarge
        } else {
            ApiError::MalformedBody(format!("failed to read body: {inner}"))
        }
    })?;

    if !bytes.is_empty() {
        serde_json::from_slice::<serde::de::IgnoredAny>(&bytes)
            .map_err(|err| ApiError::MalformedBody(err.to_string()))?;
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(content_type: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        map
    }

    #[test]
    fn json_detection_ignores_parameters_and_case() {
        assert!(is_json(&headers("application/json")));
        assert!(is_json(&headers("Application/JSON; charset=utf-8")));
        assert!(!is_json(&headers("text/plain")));
        assert!(!is_json(&HeaderMap::new()));
    }
}
