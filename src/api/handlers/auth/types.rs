//! Request/response types and error helpers for auth endpoints.

use crate::identity::{Identity, Role};
use crate::session::SessionEntry;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub accept_terms: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserBody {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: Role,
}

impl From<&Identity> for UserBody {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.to_string(),
            email: identity.email.clone(),
            username: identity.username.clone(),
            role: identity.role,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairBody {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub success: bool,
    pub user: UserBody,
    pub tokens: TokenPairBody,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionBody {
    pub id: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub current: bool,
}

impl SessionBody {
    #[must_use]
    pub fn from_entry(entry: &SessionEntry, current_id: &str) -> Self {
        Self {
            id: entry.id.clone(),
            ip: entry.record.ip.clone(),
            user_agent: entry.record.user_agent.clone(),
            created_at: entry.record.created_at,
            expires_at: entry.record.expires_at,
            current: entry.id == current_id,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionListResponse {
    pub success: bool,
    pub sessions: Vec<SessionBody>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RevokedResponse {
    pub success: bool,
    pub revoked: usize,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Uniform error body: `success` is always false, `code` is machine-readable,
/// `retryAfter` appears on 429s and `errors` on validation failures.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

pub fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            success: false,
            message: message.to_string(),
            code: code.to_string(),
            retry_after: None,
            errors: None,
        }),
    )
        .into_response()
}

pub fn locked_response(code: &str, message: &str, retry_after: u64) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [("Retry-After", retry_after.to_string())],
        Json(ErrorBody {
            success: false,
            message: message.to_string(),
            code: code.to_string(),
            retry_after: Some(retry_after),
            errors: None,
        }),
    )
        .into_response()
}

pub fn validation_response(errors: Vec<FieldError>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            success: false,
            message: "Validation failed".to_string(),
            code: "VALIDATION_ERROR".to_string(),
            retry_after: None,
            errors: Some(errors),
        }),
    )
        .into_response()
}

/// 503 used whenever a backing store cannot answer a security-relevant
/// question; these paths fail closed.
pub fn unavailable_response() -> Response {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "SERVICE_UNAVAILABLE",
        "Service temporarily unavailable",
    )
}
