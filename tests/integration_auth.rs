//! End-to-end tests for the auth API.
//!
//! The full router is driven through `tower::ServiceExt::oneshot` with
//! in-process identity and counter stores, so the suite needs no running
//! Postgres or Redis. Wire formats, status codes, and error codes are
//! asserted exactly as clients see them.

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE},
};
use gatekeeper::{
    api,
    api::handlers::auth::{AuthConfig, AuthState},
    guard::GuardConfig,
    identity::{MemoryIdentityStore, Role},
    limiter::{LimiterConfig, TierPolicy},
    store::MemoryStore,
};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;
use uuid::Uuid;

fn test_config() -> AuthConfig {
    AuthConfig::new(
        "http://localhost:5173".to_string(),
        SecretString::from("integration-access-secret"),
        SecretString::from("integration-refresh-secret"),
    )
}

fn test_app(config: AuthConfig) -> Result<Router> {
    let state = Arc::new(AuthState::new(
        config,
        Arc::new(MemoryIdentityStore::new()),
        Arc::new(MemoryStore::new()),
    ));
    api::app(state)
}

async fn send(
    app: &Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = response.into_body().collect().await?.to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

fn register_body(email: &str, username: &str, password: &str) -> Value {
    json!({
        "email": email,
        "username": username,
        "password": password,
        "confirmPassword": password,
        "acceptTerms": true,
    })
}

async fn register(app: &Router, email: &str, username: &str, password: &str) -> Result<Value> {
    let (status, body) = send(
        app,
        "POST",
        "/v1/auth/register",
        None,
        Some(register_body(email, username, password)),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    Ok(body)
}

#[tokio::test]
async fn health_reports_ok_without_external_stores() -> Result<()> {
    let app = test_app(test_config())?;
    let (status, body) = send(&app, "GET", "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
    Ok(())
}

#[tokio::test]
async fn register_creates_account_and_issues_tokens() -> Result<()> {
    let app = test_app(test_config())?;
    let body = register(&app, "alice@example.com", "alice", "hunter2hunter2").await?;

    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["tokens"]["accessToken"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["tokens"]["refreshToken"].as_str().is_some_and(|t| !t.is_empty()));
    Ok(())
}

#[tokio::test]
async fn register_rejects_duplicate_email_and_username() -> Result<()> {
    let app = test_app(test_config())?;
    register(&app, "alice@example.com", "alice", "hunter2hunter2").await?;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/auth/register",
        None,
        Some(register_body("alice@example.com", "other", "hunter2hunter2")),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "EMAIL_TAKEN");

    let (status, body) = send(
        &app,
        "POST",
        "/v1/auth/register",
        None,
        Some(register_body("other@example.com", "alice", "hunter2hunter2")),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "USERNAME_TAKEN");
    Ok(())
}

#[tokio::test]
async fn register_rejects_invalid_payload_with_field_errors() -> Result<()> {
    let app = test_app(test_config())?;
    let (status, body) = send(
        &app,
        "POST",
        "/v1/auth/register",
        None,
        Some(json!({
            "email": "not-an-email",
            "username": "x",
            "password": "short",
            "confirmPassword": "different",
            "acceptTerms": false,
        })),
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let errors = body["errors"].as_array().expect("errors array");
    let fields: Vec<&str> = errors
        .iter()
        .filter_map(|e| e["field"].as_str())
        .collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"username"));
    assert!(fields.contains(&"password"));
    assert!(fields.contains(&"confirmPassword"));
    assert!(fields.contains(&"acceptTerms"));
    Ok(())
}

#[tokio::test]
async fn login_returns_tokens_that_authenticate_me() -> Result<()> {
    let app = test_app(test_config())?;
    register(&app, "alice@example.com", "alice", "hunter2hunter2").await?;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "hunter2hunter2"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let access = body["tokens"]["accessToken"].as_str().expect("access token");

    let (status, body) = send(&app, "GET", "/v1/me", Some(access), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "alice");
    Ok(())
}

#[tokio::test]
async fn login_rejects_unknown_email_and_wrong_password() -> Result<()> {
    let app = test_app(test_config())?;
    register(&app, "alice@example.com", "alice", "hunter2hunter2").await?;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({"email": "ghost@example.com", "password": "whatever123"})),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "USER_NOT_FOUND");

    let (status, body) = send(
        &app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "wrongwrong1"})),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INCORRECT_PASSWORD");
    Ok(())
}

#[tokio::test]
async fn me_requires_a_bearer_token() -> Result<()> {
    let app = test_app(test_config())?;
    let (status, body) = send(&app, "GET", "/v1/me", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "NO_TOKEN");
    Ok(())
}

#[tokio::test]
async fn logout_revokes_the_presented_token() -> Result<()> {
    let app = test_app(test_config())?;
    let body = register(&app, "alice@example.com", "alice", "hunter2hunter2").await?;
    let access = body["tokens"]["accessToken"].as_str().expect("access token").to_string();

    let (status, _) = send(&app, "POST", "/v1/auth/logout", Some(&access), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/v1/me", Some(&access), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_REVOKED");
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_and_invalidates_the_previous_token() -> Result<()> {
    let app = test_app(test_config())?;
    let body = register(&app, "alice@example.com", "alice", "hunter2hunter2").await?;
    let old_refresh = body["tokens"]["refreshToken"]
        .as_str()
        .expect("refresh token")
        .to_string();

    // Claims carry second-granularity timestamps; wait so the rotated token
    // cannot be byte-identical to the one it replaces.
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/auth/refresh",
        None,
        Some(json!({"refreshToken": old_refresh})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let new_refresh = body["refreshToken"].as_str().expect("rotated refresh token");
    assert_ne!(new_refresh, old_refresh);
    assert!(body["accessToken"].as_str().is_some_and(|t| !t.is_empty()));

    let (status, body) = send(
        &app,
        "POST",
        "/v1/auth/refresh",
        None,
        Some(json!({"refreshToken": old_refresh})),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_REFRESH_TOKEN");
    Ok(())
}

#[tokio::test]
async fn repeated_login_failures_lock_the_account() -> Result<()> {
    let config = test_config().with_guard(GuardConfig {
        identity_threshold: 5,
        origin_threshold: 10,
        window: Duration::from_secs(900),
    });
    let app = test_app(config)?;
    register(&app, "alice@example.com", "alice", "hunter2hunter2").await?;
    register(&app, "bob@example.com", "bob", "hunter2hunter2").await?;

    for _ in 0..5 {
        let (status, body) = send(
            &app,
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({"email": "alice@example.com", "password": "wrongwrong1"})),
        )
        .await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INCORRECT_PASSWORD");
    }

    // Sixth attempt is locked out before the password is even checked.
    let (status, body) = send(
        &app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "hunter2hunter2"})),
    )
    .await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "ACCOUNT_LOCKED");
    assert!(body["retryAfter"].as_u64().is_some());

    // A different account from the same origin is still under the origin
    // threshold and logs in normally.
    let (status, _) = send(
        &app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({"email": "bob@example.com", "password": "hunter2hunter2"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn auth_tier_rate_limit_exhausts_and_resets() -> Result<()> {
    let config = test_config().with_limiter(LimiterConfig::default().with_auth(TierPolicy {
        max: 3,
        window: Duration::from_millis(200),
    }));
    let app = test_app(config)?;

    let attempt = json!({"email": "ghost@example.com", "password": "whatever123"});
    for _ in 0..3 {
        let (status, _) = send(&app, "POST", "/v1/auth/login", None, Some(attempt.clone())).await?;
        // Rejected logins still consume budget.
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = send(&app, "POST", "/v1/auth/login", None, Some(attempt.clone())).await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "AUTH_RATE_LIMITED");

    // A fresh window admits requests again.
    tokio::time::sleep(Duration::from_millis(250)).await;
    let (status, _) = send(&app, "POST", "/v1/auth/login", None, Some(attempt)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn responses_carry_rate_limit_headers() -> Result<()> {
    let app = test_app(test_config())?;
    let request = Request::builder().method("GET").uri("/health").body(Body::empty())?;
    let response = app.oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let limit = response
        .headers()
        .get("X-RateLimit-Limit")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .expect("limit header");
    let remaining = response
        .headers()
        .get("X-RateLimit-Remaining")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .expect("remaining header");
    assert_eq!(limit, 1000);
    assert_eq!(remaining, 999);
    Ok(())
}

#[tokio::test]
async fn password_change_ends_existing_sessions() -> Result<()> {
    let app = test_app(test_config())?;
    let body = register(&app, "alice@example.com", "alice", "hunter2hunter2").await?;
    let access = body["tokens"]["accessToken"].as_str().expect("access token").to_string();

    let (status, body) = send(
        &app,
        "PUT",
        "/v1/auth/password",
        Some(&access),
        Some(json!({"currentPassword": "hunter2hunter2", "newPassword": "correcthorse9"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "password change failed: {body}");

    // The token used for the change is dead along with every session.
    let (status, _) = send(&app, "GET", "/v1/me", Some(&access), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The old password no longer works, the new one does.
    let (status, body) = send(
        &app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "hunter2hunter2"})),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INCORRECT_PASSWORD");

    let (status, _) = send(
        &app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "correcthorse9"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn session_listing_and_targeted_revocation() -> Result<()> {
    let app = test_app(test_config())?;
    register(&app, "alice@example.com", "alice", "hunter2hunter2").await?;

    // A remember-me login gets different token TTLs, so its session id cannot
    // collide with the registration session even within the same second.
    let (status, body) = send(
        &app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({
            "email": "alice@example.com",
            "password": "hunter2hunter2",
            "rememberMe": true,
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let access = body["tokens"]["accessToken"].as_str().expect("access token").to_string();

    let (status, body) = send(&app, "GET", "/v1/auth/sessions", Some(&access), None).await?;
    assert_eq!(status, StatusCode::OK);
    let sessions = body["sessions"].as_array().expect("sessions array");
    assert_eq!(sessions.len(), 2);
    assert_eq!(
        sessions.iter().filter(|s| s["current"] == true).count(),
        1
    );

    let other_id = sessions
        .iter()
        .find(|s| s["current"] == false)
        .and_then(|s| s["id"].as_str())
        .expect("non-current session id")
        .to_string();

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/v1/auth/sessions/{other_id}"),
        Some(&access),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revoked"], 1);

    let (status, body) = send(&app, "GET", "/v1/auth/sessions", Some(&access), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessions"].as_array().expect("sessions array").len(), 1);

    // Revoking it again is a 404: the id no longer belongs to the caller.
    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/v1/auth/sessions/{other_id}"),
        Some(&access),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "SESSION_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn admin_revocation_requires_admin_role() -> Result<()> {
    let identities = Arc::new(MemoryIdentityStore::new());
    let state = Arc::new(AuthState::new(
        test_config(),
        identities.clone(),
        Arc::new(MemoryStore::new()),
    ));
    let app = api::app(state)?;

    let body = register(&app, "alice@example.com", "alice", "hunter2hunter2").await?;
    let alice_token = body["tokens"]["accessToken"].as_str().expect("access token").to_string();
    let alice_id: Uuid = body["user"]["id"].as_str().expect("user id").parse()?;

    let body = register(&app, "root@example.com", "rootadmin", "hunter2hunter2").await?;
    let admin_token = body["tokens"]["accessToken"].as_str().expect("access token").to_string();
    let admin_id: Uuid = body["user"]["id"].as_str().expect("user id").parse()?;

    let path = format!("/v1/admin/users/{alice_id}/sessions");

    // A regular user is refused.
    let (status, body) = send(&app, "DELETE", &path, Some(&alice_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "INSUFFICIENT_ROLE");

    identities.set_role(admin_id, Role::Admin).await;

    let (status, body) = send(&app, "DELETE", &path, Some(&admin_token), None).await?;
    assert_eq!(status, StatusCode::OK, "admin revoke failed: {body}");
    assert_eq!(body["revoked"], 1);

    // Alice's token still verifies (access tokens are stateless) but her
    // refresh token and session listing are gone.
    let (status, body) = send(&app, "GET", "/v1/auth/sessions", Some(&alice_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessions"].as_array().expect("sessions array").len(), 0);
    Ok(())
}
