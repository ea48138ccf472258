use super::auth::AuthState;
use crate::GIT_COMMIT_HASH;
use axum::{
    Extension,
    body::Body,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
    counter_store: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Identity database and counter store are healthy", body = [Health]),
        (status = 503, description = "Identity database or counter store is unhealthy", body = [Health])
    ),
    tag = "health"
)]
// axum handler for health
pub async fn health(method: Method, Extension(state): Extension<Arc<AuthState>>) -> impl IntoResponse {
    let database_ok = match state.identities().ping().await {
        Ok(()) => true,
        Err(err) => {
            error!("Failed to ping identity database: {err}");
            false
        }
    };

    // Counter store degradation is reported but not fatal: the limiter and
    // lockout counters fail open by design.
    let store_ok = match state.store().ping().await {
        Ok(()) => true,
        Err(err) => {
            debug!("Counter store ping failed: {err}");
            false
        }
    };

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if database_ok {
            "ok".to_string()
        } else {
            "error".to_string()
        },
        counter_store: if store_ok {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app| {
            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app);
            headers
        })
        .unwrap_or_else(|err| {
            error!("Failed to parse X-App header: {err}");
            HeaderMap::new()
        });

    if database_ok {
        (StatusCode::OK, headers, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}
