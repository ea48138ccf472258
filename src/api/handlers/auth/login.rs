//! Credential login with lockout protection.

use super::state::AuthState;
use super::types::{
    AuthResponse, ErrorBody, LoginRequest, TokenPairBody, UserBody, error_response,
    locked_response, unavailable_response,
};
use super::utils::{client_ip, user_agent, verify_password};
use crate::guard::GuardStatus;
use crate::session::SessionRecord;
use axum::{
    Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated, tokens issued", body = AuthResponse),
        (status = 401, description = "Unknown email or wrong password", body = ErrorBody),
        (status = 403, description = "Account disabled", body = ErrorBody),
        (status = 429, description = "Locked after repeated failures", body = ErrorBody),
        (status = 503, description = "Backing store unavailable", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Response {
    let origin = client_ip(&headers);

    let credential = match state.identities().find_by_email(&payload.email).await {
        Ok(credential) => credential,
        Err(err) => {
            error!("Failed to lookup user: {err}");
            return unavailable_response();
        }
    };

    // Lockout check runs before any credential work so a locked caller
    // learns nothing new about the account.
    let identity_hint = credential.as_ref().map(|c| c.identity.id);
    if let GuardStatus::Locked {
        retry_after_seconds,
    } = state.guard().check(identity_hint, origin.as_deref()).await
    {
        warn!(email = %payload.email, "Login attempt while locked out");
        return locked_response(
            "ACCOUNT_LOCKED",
            "Too many failed attempts, try again later",
            retry_after_seconds,
        );
    }

    // Unknown emails never feed the failure counters; otherwise anyone
    // could lock an address they merely guessed.
    let Some(credential) = credential else {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "USER_NOT_FOUND",
            "No account with that email",
        );
    };

    if !credential.identity.is_active {
        return error_response(
            StatusCode::FORBIDDEN,
            "ACCOUNT_DISABLED",
            "Account is disabled",
        );
    }

    if !verify_password(&credential.password_hash, &payload.password) {
        state
            .guard()
            .record_failure(Some(credential.identity.id), origin.as_deref())
            .await;
        return error_response(
            StatusCode::UNAUTHORIZED,
            "INCORRECT_PASSWORD",
            "Incorrect password",
        );
    }

    state
        .guard()
        .reset(Some(credential.identity.id), origin.as_deref())
        .await;

    let identity = credential.identity;
    let pair = match state.issuer().issue_pair(&identity, payload.remember_me) {
        Ok(pair) => pair,
        Err(err) => {
            error!("Token issuance failed: {err}");
            return unavailable_response();
        }
    };

    // Overwrites any previous refresh token: one live refresh token per user.
    let stored = state
        .sessions()
        .store_refresh_token(identity.id, &pair.refresh_token, pair.refresh_ttl)
        .await;
    if let Err(err) = stored {
        error!("Failed to store refresh token: {err}");
        return unavailable_response();
    }

    let now = Utc::now();
    let record = SessionRecord {
        user_id: identity.id,
        ip: origin,
        user_agent: user_agent(&headers),
        created_at: now,
        expires_at: now
            + chrono::Duration::seconds(i64::try_from(pair.access_ttl.as_secs()).unwrap_or(0)),
    };
    if let Err(err) = state.sessions().register(&pair.access_token, &record).await {
        error!("Failed to register session: {err}");
        return unavailable_response();
    }

    info!(user_id = %identity.id, remember = payload.remember_me, "Login succeeded");

    (
        StatusCode::OK,
        Json(AuthResponse {
            success: true,
            user: UserBody::from(&identity),
            tokens: TokenPairBody {
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            },
        }),
    )
        .into_response()
}
