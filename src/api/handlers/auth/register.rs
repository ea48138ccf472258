//! Account creation.

use super::state::AuthState;
use super::types::{
    AuthResponse, ErrorBody, FieldError, RegisterRequest, TokenPairBody, UserBody, error_response,
    unavailable_response, validation_response,
};
use super::utils::{client_ip, hash_password, user_agent};
use crate::api::handlers::{valid_email, valid_password, valid_username};
use crate::identity::{InsertOutcome, NewIdentity};
use crate::session::SessionRecord;
use axum::{
    Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, tokens issued", body = AuthResponse),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 409, description = "Email or username already taken", body = ErrorBody),
        (status = 503, description = "Backing store unavailable", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Response {
    let errors = validate(&payload);
    if !errors.is_empty() {
        return validation_response(errors);
    }

    let password_hash = match hash_password(&payload.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Password hashing failed: {err}");
            return unavailable_response();
        }
    };

    let outcome = state
        .identities()
        .insert(NewIdentity {
            email: payload.email.clone(),
            username: payload.username.clone(),
            password_hash,
        })
        .await;

    let identity = match outcome {
        Ok(InsertOutcome::Created(identity)) => identity,
        Ok(InsertOutcome::EmailTaken) => {
            return error_response(
                StatusCode::CONFLICT,
                "EMAIL_TAKEN",
                "Email is already registered",
            );
        }
        Ok(InsertOutcome::UsernameTaken) => {
            return error_response(
                StatusCode::CONFLICT,
                "USERNAME_TAKEN",
                "Username is already taken",
            );
        }
        Err(err) => {
            error!("Failed to insert user: {err}");
            return unavailable_response();
        }
    };

    let pair = match state.issuer().issue_pair(&identity, false) {
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
        error!("Failed to store refresh token: {err}");
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
        error!("Failed to register session: {err}");
        return unavailable_response();
    }

    info!(user_id = %identity.id, "Account created");

    (
        StatusCode::CREATED,
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

fn validate(payload: &RegisterRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if !valid_email(&payload.email) {
        errors.push(FieldError {
            field: "email".to_string(),
            message: "Invalid email address".to_string(),
        });
    }
    if !valid_username(&payload.username) {
        errors.push(FieldError {
            field: "username".to_string(),
            message: "Username must be 3-30 characters: letters, digits, underscores".to_string(),
        });
    }
    if !valid_password(&payload.password) {
        errors.push(FieldError {
            field: "password".to_string(),
            message: "Password must be at least 8 characters with a letter and a digit"
                .to_string(),
        });
    }
    if payload.password != payload.confirm_password {
        errors.push(FieldError {
            field: "confirmPassword".to_string(),
            message: "Passwords do not match".to_string(),
        });
    }
    if !payload.accept_terms {
        errors.push(FieldError {
            field: "acceptTerms".to_string(),
            message: "Terms must be accepted".to_string(),
        });
    }
    errors
}
