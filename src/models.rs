use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::roles::Role;

// --- Response Schemas ---

/// EmployeeProfile
///
/// The public view of a directory entry. Carries no credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EmployeeProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// LoginResponse
///
/// Returned by `POST /api/employee/login`. The token goes into
/// `Authorization: Bearer <token>` on protected routes.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
    pub employee: EmployeeProfile,
}

/// BroadcastReceipt
///
/// How many real-time listeners an admin broadcast was handed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BroadcastReceipt {
    pub delivered_to: usize,
}

// --- Request Payloads ---

/// LoginRequest
///
/// The password is only compared against the stored hash; it is never logged.
#[derive(Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    #[schema(example = "cashier@storefront.test")]
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// BroadcastRequest
///
/// Admin-issued notification pushed to every real-time listener.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BroadcastRequest {
    #[schema(example = "store.announcement")]
    pub name: String,
    #[serde(default)]
    #[ts(type = "unknown")]
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}
