//! Session listing and revocation, including the admin variant.

use super::bearer::authenticate;
use super::state::AuthState;
use super::types::{
    ErrorBody, RevokedResponse, SessionBody, SessionListResponse, error_response,
    unavailable_response,
};
use crate::identity::Role;
use crate::token::hash_token;
use axum::{
    Extension,
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/v1/auth/sessions",
    responses(
        (status = 200, description = "Live sessions for the caller", body = SessionListResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorBody),
        (status = 503, description = "Backing store unavailable", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn list_sessions(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> Response {
    let (context, token) = match authenticate(&state, &headers).await {
        Ok(ok) => ok,
        Err(response) => return response,
    };

    match state.sessions().list(context.identity.id).await {
        Ok(entries) => {
            let current_id = hash_token(token);
            let sessions = entries
                .iter()
                .map(|entry| SessionBody::from_entry(entry, &current_id))
                .collect();
            (
                StatusCode::OK,
                Json(SessionListResponse {
                    success: true,
                    sessions,
                }),
            )
                .into_response()
        }
        Err(err) => {
            error!("Failed to list sessions: {err}");
            unavailable_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/v1/auth/sessions/{id}",
    params(("id" = String, Path, description = "Session id from the listing")),
    responses(
        (status = 200, description = "Session revoked", body = RevokedResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorBody),
        (status = 404, description = "No such session for this user", body = ErrorBody),
        (status = 503, description = "Backing store unavailable", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn revoke_session(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let (context, _token) = match authenticate(&state, &headers).await {
        Ok(ok) => ok,
        Err(response) => return response,
    };

    match state.sessions().revoke(context.identity.id, &id).await {
        Ok(true) => {
            info!(user_id = %context.identity.id, "Session revoked");
            (
                StatusCode::OK,
                Json(RevokedResponse {
                    success: true,
                    revoked: 1,
                }),
            )
                .into_response()
        }
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            "SESSION_NOT_FOUND",
            "No such session",
        ),
        Err(err) => {
            error!("Failed to revoke session: {err}");
            unavailable_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/v1/admin/users/{id}/sessions",
    params(("id" = Uuid, Path, description = "Target user id")),
    responses(
        (status = 200, description = "All of the user's sessions revoked", body = RevokedResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 503, description = "Backing store unavailable", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn admin_revoke_sessions(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let (context, _token) = match authenticate(&state, &headers).await {
        Ok(ok) => ok,
        Err(response) => return response,
    };

    if context.identity.role < Role::Admin {
        return error_response(
            StatusCode::FORBIDDEN,
            "INSUFFICIENT_ROLE",
            "Admin role required",
        );
    }

    match state.sessions().revoke_all(id).await {
        Ok(revoked) => {
            info!(admin_id = %context.identity.id, user_id = %id, revoked, "Admin revoked user sessions");
            (
                StatusCode::OK,
                Json(RevokedResponse {
                    success: true,
                    revoked,
                }),
            )
                .into_response()
        }
        Err(err) => {
            error!("Failed to revoke user sessions: {err}");
            unavailable_response()
        }
    }
}
