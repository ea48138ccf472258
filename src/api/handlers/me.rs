//! Authenticated profile endpoint.

use super::auth::AuthState;
use super::auth::bearer::authenticate;
use super::auth::types::{ErrorBody, UserBody};
use axum::{
    Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MeResponse {
    pub success: bool,
    pub user: UserBody,
}

#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "The authenticated profile", body = MeResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorBody),
        (status = 403, description = "Account disabled", body = ErrorBody),
        (status = 503, description = "Verification backend unavailable", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "gatekeeper"
)]
pub async fn me(Extension(state): Extension<Arc<AuthState>>, headers: HeaderMap) -> Response {
    match authenticate(&state, &headers).await {
        Ok((context, _token)) => (
            StatusCode::OK,
            Json(MeResponse {
                success: true,
                user: UserBody::from(&context.identity),
            }),
        )
            .into_response(),
        Err(response) => response,
    }
}
