//! Refresh-token rotation.

use super::state::AuthState;
use super::types::{ErrorBody, RefreshRequest, error_response, unavailable_response};
use super::utils::{client_ip, user_agent};
use crate::session::SessionRecord;
use axum::{
    Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub success: bool,
    pub access_token: String,
    pub refresh_token: String,
}

fn invalid() -> Response {
    // One code for every refresh failure mode; callers can't distinguish
    // expiry from theft-driven mismatch, they just re-authenticate.
    error_response(
        StatusCode::UNAUTHORIZED,
        "INVALID_REFRESH_TOKEN",
        "Refresh token is invalid or expired",
    )
}

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair issued", body = RefreshResponse),
        (status = 401, description = "Refresh token invalid, expired, or superseded", body = ErrorBody),
        (status = 503, description = "Backing store unavailable", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn refresh(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    Json(payload): Json<RefreshRequest>,
) -> Response {
    let claims = match state.issuer().decode_refresh(&payload.refresh_token) {
        Ok(claims) => claims,
        Err(err) => {
            debug!("Refresh token rejected: {err}");
            return invalid();
        }
    };

    // The signature alone is not enough: the token must also match the
    // stored singleton, so a rotated-away token stops working immediately.
    match state
        .sessions()
        .verify_refresh_token(claims.sub, &payload.refresh_token)
        .await
    {
        Ok(true) => {}
        Ok(false) => return invalid(),
        Err(err) => {
            error!("Failed to check stored refresh token: {err}");
            return unavailable_response();
        }
    }

    let identity = match state.identities().find_by_id(claims.sub).await {
        Ok(Some(identity)) if identity.is_active => identity,
        Ok(_) => return invalid(),
        Err(err) => {
            error!("Failed to lookup user for refresh: {err}");
            return unavailable_response();
        }
    };

    // Carry the remember-me horizon forward from the old token's lifetime.
    let remember = claims.exp - claims.iat
        > i64::try_from(state.config().refresh_ttl_seconds()).unwrap_or(i64::MAX);
    let pair = match state.issuer().issue_pair(&identity, remember) {
        Ok(pair) => pair,
        Err(err) => {
            error!("Token issuance failed: {err}");
            return unavailable_response();
        }
    };

    let stored = state
        .sessions()
        .store_refresh_token(identity.id, &pair.refresh_token, pair.refresh_ttl)
        .await;
    if let Err(err) = stored {
        error!("Failed to rotate refresh token: {err}");
        return unavailable_response();
    }

    let now = Utc::now();
    let record = SessionRecord {
        user_id: identity.id,
        ip: client_ip(&headers),
        user_agent: user_agent(&headers),
        created_at: now,
        expires_at: now
            + chrono::Duration::seconds(i64::try_from(pair.access_ttl.as_secs()).unwrap_or(0)),
    };
    if let Err(err) = state.sessions().register(&pair.access_token, &record).await {
        error!("Failed to register refreshed session: {err}");
        return unavailable_response();
    }

    info!(user_id = %identity.id, "Token pair rotated");

    (
        StatusCode::OK,
        Json(RefreshResponse {
            success: true,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }),
    )
        .into_response()
}
