//! Logout: revoke the presented token and every other session.

use super::bearer::authenticate;
use super::state::AuthState;
use super::types::{ErrorBody, MessageResponse, unavailable_response};
use crate::token::TokenIssuer;
use axum::{
    Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, info};

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 200, description = "All sessions revoked", body = MessageResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorBody),
        (status = 503, description = "Backing store unavailable", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> Response {
    let (context, token) = match authenticate(&state, &headers).await {
        Ok(ok) => ok,
        Err(response) => return response,
    };

    // The access token outlives its session entry unless explicitly
    // blacklisted for its remaining lifetime.
    let remaining = TokenIssuer::remaining_lifetime(context.claims.exp);
    if let Err(err) = state.blacklist().revoke(token, remaining).await {
        error!("Failed to blacklist token: {err}");
        return unavailable_response();
    }

    match state.sessions().revoke_all(context.identity.id).await {
        Ok(revoked) => {
            info!(user_id = %context.identity.id, revoked, "Logged out");
            (
                StatusCode::OK,
                Json(MessageResponse {
                    success: true,
                    message: "Logged out".to_string(),
                }),
            )
                .into_response()
        }
        Err(err) => {
            error!("Failed to revoke sessions: {err}");
            unavailable_response()
        }
    }
}
