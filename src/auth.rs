use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    directory::{DirectoryState, Employee},
    error::ApiError,
    roles::{self, Role, RoleSet},
};

/// Header accepted as a stand-in for a token when running with `Env::Local`.
pub const DEV_BYPASS_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload of an employee session token (HS256).
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Employee id in the directory.
    pub sub: Uuid,
    /// Role at issuance. The directory's current role takes precedence on use.
    pub role: Role,
    pub iat: usize,
    /// Always validated.
    pub exp: usize,
}

/// Identity
///
/// The authenticated caller. Produced by [`authenticate`], stored in the request
/// extensions by the access gate, and consumed by the role gate and handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub role: Role,
}

impl From<&Employee> for Identity {
    fn from(employee: &Employee) -> Self {
        Self {
            id: employee.id,
            role: employee.role,
        }
    }
}

/// issue_token
///
/// Signs a session token for `employee`, valid for `config.jwt_ttl_secs`.
pub fn issue_token(
    employee: &Employee,
    config: &AppConfig,
) -> Result<(String, DateTime<Utc>), ApiError> {
    let now = Utc::now();
    let expires_at = i64::try_from(config.jwt_ttl_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            ApiError::Internal(format!("token lifetime of {}s is out of range", config.jwt_ttl_secs))
        })?;

    let claims = Claims {
        sub: employee.id,
        role: employee.role,
        iat: now.timestamp() as usize,
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;
    Ok((token, expires_at))
}

/// authenticate
///
/// Resolves the caller of a request into an [`Identity`]:
/// 1. `Env::Local` only: an `x-user-id` header naming a directory entry.
/// 2. `Authorization: Bearer <jwt>`, signature and expiry checked.
/// 3. The employee must still exist and be active; its current role is used.
///
/// Every credential problem is `ApiError::Unauthenticated`. A directory failure is
/// an internal error, not a rejection.
pub async fn authenticate(
    parts: &Parts,
    directory: &DirectoryState,
    config: &AppConfig,
) -> Result<Identity, ApiError> {
    if config.env == Env::Local {
        let bypass_id = parts
            .headers
            .get(DEV_BYPASS_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| Uuid::parse_str(raw).ok());

        if let Some(id) = bypass_id {
            if let Some(employee) = directory.find_by_id(id).await? {
                if employee.active {
                    tracing::debug!(employee = %id, "authenticated through local bypass header");
                    return Ok(Identity::from(&employee));
                }
            }
        }
        // Falls through to token validation when the bypass did not resolve.
    }

    let token = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::Unauthenticated)?;

    let mut validation = Validation::default();
    validation.validate_exp = true;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        ApiError::Unauthenticated
    })?
    .claims;

    let employee = directory
        .find_by_id(claims.sub)
        .await?
        .filter(|employee| employee.active)
        .ok_or(ApiError::Unauthenticated)?;

    if employee.role != claims.role {
        tracing::info!(
            employee = %employee.id,
            token_role = %claims.role,
            current_role = %employee.role,
            "role changed since token issuance; using directory role"
        );
    }

    Ok(Identity::from(&employee))
}

/// authorize_role
///
/// The role gate. Requires an identity that an earlier authentication step has
/// already produced; it never authenticates on its own.
pub fn authorize_role(identity: &Identity, required: RoleSet) -> Result<(), ApiError> {
    if roles::permits(required, identity.role) {
        Ok(())
    } else {
        tracing::debug!(employee = %identity.id, role = %identity.role, ?required, "role gate denied");
        Err(ApiError::Forbidden)
    }
}

/// Identity extractor
///
/// Handlers behind the access gate receive the identity the gate stored. A handler
/// outside the gate authenticates the request itself.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
    DirectoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(*identity);
        }

        let directory = DirectoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        let identity = authenticate(parts, &directory, &config).await?;
        parts.extensions.insert(identity);
        Ok(identity)
    }
}
