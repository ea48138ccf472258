//! Request admission: rate limiting before authentication.

use crate::api::handlers::auth::AuthState;
use crate::api::handlers::auth::bearer::extract_bearer_token;
use crate::api::handlers::auth::types::locked_response;
use crate::api::handlers::auth::utils::client_ip;
use crate::limiter::RouteClass;
use axum::{
    Extension,
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// Billing subject for a request: the authenticated user when the bearer
/// token's signature checks out (even if expired), otherwise the client
/// address. Full verification happens later; a forged token can never buy a
/// fresh budget because the signature check fails first.
fn subject(state: &AuthState, request: &Request) -> String {
    if let Some(token) = extract_bearer_token(request.headers()) {
        if let Some(user_id) = state.issuer().peek_subject(token) {
            return format!("user:{user_id}");
        }
    }
    match client_ip(request.headers()) {
        Some(ip) => format!("ip:{ip}"),
        None => "ip:unknown".to_string(),
    }
}

/// Admission middleware applied to every route. Runs before any handler and
/// before authentication; a 429 costs no database work.
pub async fn rate_limit(
    Extension(state): Extension<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    let class = RouteClass::classify(request.uri().path());
    let subject = subject(&state, &request);
    let decision = state.limiter().admit(&subject, class).await;

    if !decision.allowed {
        debug!(
            subject,
            class = class.as_str(),
            "Request rejected by rate limiter"
        );
        return locked_response(
            class.limit_code(),
            "Too many requests, slow down",
            decision.retry_after_seconds,
        );
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("X-RateLimit-Limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", value);
    }
    response
}
