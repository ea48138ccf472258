//! Bearer-token extraction and authentication for protected handlers.

use super::state::AuthState;
use super::types::error_response;
use crate::token::{AuthContext, VerifyError, VerifyFailure};
use axum::{
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::Response,
};
use tracing::warn;

/// Pull the token out of `Authorization: Bearer <token>`.
#[must_use]
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Run the full verification pipeline for a request, mapping each failure to
/// its HTTP response. Returns the verified context and the raw token (the
/// token is needed again for session identity and logout revocation).
///
/// # Errors
/// A ready-to-send error response: 401 with a machine-readable code for
/// rejections, 403 for disabled accounts, 503 when verification backends are
/// down.
pub async fn authenticate<'a>(
    state: &AuthState,
    headers: &'a HeaderMap,
) -> Result<(AuthContext, &'a str), Response> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "NO_TOKEN",
            "Missing bearer token",
        ));
    };

    match state.verifier().verify(token).await {
        Ok(context) => Ok((context, token)),
        Err(VerifyError::Rejected(failure)) => Err(rejection_response(failure)),
        Err(VerifyError::Unavailable(err)) => {
            warn!("Token verification backend unavailable: {err}");
            Err(super::types::unavailable_response())
        }
    }
}

fn rejection_response(failure: VerifyFailure) -> Response {
    let (status, code, message) = match failure {
        VerifyFailure::Revoked => (
            StatusCode::UNAUTHORIZED,
            "TOKEN_REVOKED",
            "Token has been revoked",
        ),
        VerifyFailure::Expired => (
            StatusCode::UNAUTHORIZED,
            "TOKEN_EXPIRED",
            "Token has expired",
        ),
        VerifyFailure::Malformed => (
            StatusCode::UNAUTHORIZED,
            "INVALID_TOKEN",
            "Token is invalid",
        ),
        VerifyFailure::IdentityNotFound => (
            StatusCode::UNAUTHORIZED,
            "USER_NOT_FOUND",
            "User no longer exists",
        ),
        VerifyFailure::IdentityDisabled => (
            StatusCode::FORBIDDEN,
            "ACCOUNT_DISABLED",
            "Account is disabled",
        ),
        VerifyFailure::PasswordChanged => (
            StatusCode::UNAUTHORIZED,
            "PASSWORD_CHANGED",
            "Password was changed after this token was issued",
        ),
    };
    error_response(status, code, message)
}
