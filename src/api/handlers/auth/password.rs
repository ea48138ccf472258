//! Password change: rotate the credential and cut off every old token.

use super::bearer::authenticate;
use super::state::AuthState;
use super::types::{
    ChangePasswordRequest, ErrorBody, FieldError, MessageResponse, error_response,
    unavailable_response, validation_response,
};
use super::utils::{hash_password, verify_password};
use crate::api::handlers::valid_password;
use crate::token::TokenIssuer;
use axum::{
    Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, info};

#[utoipa::path(
    put,
    path = "/v1/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed, all sessions revoked", body = MessageResponse),
        (status = 400, description = "New password too weak", body = ErrorBody),
        (status = 401, description = "Bearer token or current password invalid", body = ErrorBody),
        (status = 503, description = "Backing store unavailable", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn change_password(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    Json(payload): Json<ChangePasswordRequest>,
) -> Response {
    let (context, token) = match authenticate(&state, &headers).await {
        Ok(ok) => ok,
        Err(response) => return response,
    };

    if !valid_password(&payload.new_password) {
        return validation_response(vec![FieldError {
            field: "newPassword".to_string(),
            message: "Password must be at least 8 characters with a letter and a digit"
                .to_string(),
        }]);
    }

    let credential = match state.identities().find_by_email(&context.identity.email).await {
        Ok(Some(credential)) => credential,
        Ok(None) => {
            return error_response(
                StatusCode::UNAUTHORIZED,
                "USER_NOT_FOUND",
                "User no longer exists",
            );
        }
        Err(err) => {
            error!("Failed to lookup user for password change: {err}");
            return unavailable_response();
        }
    };

    if !verify_password(&credential.password_hash, &payload.current_password) {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "INCORRECT_PASSWORD",
            "Current password is incorrect",
        );
    }

    let new_hash = match hash_password(&payload.new_password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Password hashing failed: {err}");
            return unavailable_response();
        }
    };

    if let Err(err) = state
        .identities()
        .update_password(context.identity.id, &new_hash)
        .await
    {
        error!("Failed to update password: {err}");
        return unavailable_response();
    }

    // The cached profile still carries the old password_changed_at; without
    // this the staleness check would miss tokens for up to the cache TTL.
    state.verifier().invalidate_profile(context.identity.id).await;

    if let Err(err) = state.sessions().revoke_all(context.identity.id).await {
        error!("Failed to revoke sessions after password change: {err}");
        return unavailable_response();
    }

    // The presented token was issued at the same second the change lands;
    // blacklist it explicitly so iat granularity can't keep it alive.
    let remaining = TokenIssuer::remaining_lifetime(context.claims.exp);
    if let Err(err) = state.blacklist().revoke(token, remaining).await {
        error!("Failed to blacklist token after password change: {err}");
        return unavailable_response();
    }

    info!(user_id = %context.identity.id, "Password changed, sessions revoked");

    (
        StatusCode::OK,
        Json(MessageResponse {
            success: true,
            message: "Password changed, please log in again".to_string(),
        }),
    )
        .into_response()
}
