//! Token issuance and decoding.
//!
//! Access tokens are stateless HS256 JWTs carrying identity and role claims;
//! refresh tokens are longer-lived JWTs whose hash is additionally persisted
//! server-side so exactly one refresh token per identity is ever valid.
//! Access and refresh tokens are signed with distinct secrets, so one can
//! never be replayed as the other.

use crate::identity::{Identity, Role};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use uuid::Uuid;

mod blacklist;
mod verifier;

pub use blacklist::TokenBlacklist;
pub use verifier::{AuthContext, ProfileCache, TokenVerifier, VerifyError, VerifyFailure};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token malformed or signature invalid")]
    Malformed,
}

/// Claims embedded in an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Claims embedded in a refresh token. Identity details are deliberately
/// absent; refresh always re-reads the user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// A freshly issued access/refresh pair plus the refresh storage TTL.
#[derive(Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

/// SHA-256 hex of a token. Anything persisted server-side (revocation
/// entries, session keys, the refresh singleton) stores only this hash.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Signs and decodes both token kinds.
pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    remember_access_ttl: Duration,
    refresh_ttl: Duration,
    remember_refresh_ttl: Duration,
}

impl TokenIssuer {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        access_secret: &SecretString,
        refresh_secret: &SecretString,
        issuer: String,
        audience: String,
        access_ttl: Duration,
        remember_access_ttl: Duration,
        refresh_ttl: Duration,
        remember_refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.expose_secret().as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.expose_secret().as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.expose_secret().as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.expose_secret().as_bytes()),
            issuer,
            audience,
            access_ttl,
            remember_access_ttl,
            refresh_ttl,
            remember_refresh_ttl,
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        // No leeway: a token expiring at T is rejected at T, which the
        // short-expiry tests depend on.
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation
    }

    /// Issue a matching access/refresh pair for an identity.
    ///
    /// # Errors
    /// Fails only if JWT encoding itself fails (invalid key material).
    pub fn issue_pair(&self, identity: &Identity, remember: bool) -> anyhow::Result<TokenPair> {
        let now = Utc::now().timestamp();
        let access_ttl = if remember {
            self.remember_access_ttl
        } else {
            self.access_ttl
        };
        let refresh_ttl = if remember {
            self.remember_refresh_ttl
        } else {
            self.refresh_ttl
        };

        let access = AccessClaims {
            sub: identity.id,
            email: identity.email.clone(),
            username: identity.username.clone(),
            role: identity.role,
            iat: now,
            exp: now + i64::try_from(access_ttl.as_secs()).unwrap_or(i64::MAX),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let refresh = RefreshClaims {
            sub: identity.id,
            iat: now,
            exp: now + i64::try_from(refresh_ttl.as_secs()).unwrap_or(i64::MAX),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        let header = Header::new(Algorithm::HS256);
        let access_token = jsonwebtoken::encode(&header, &access, &self.access_encoding)?;
        let refresh_token = jsonwebtoken::encode(&header, &refresh, &self.refresh_encoding)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_ttl,
            refresh_ttl,
        })
    }

    /// Decode and validate an access token.
    ///
    /// # Errors
    /// `Expired` for a valid-but-stale token, `Malformed` for everything else
    /// (bad signature, wrong issuer/audience, garbage input).
    pub fn decode_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        jsonwebtoken::decode::<AccessClaims>(token, &self.access_decoding, &self.validation())
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }

    /// Decode and validate a refresh token.
    ///
    /// # Errors
    /// Same mapping as [`Self::decode_access`].
    pub fn decode_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        jsonwebtoken::decode::<RefreshClaims>(token, &self.refresh_decoding, &self.validation())
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }

    /// Signature-checked subject extraction that ignores expiry. Used only
    /// for rate-limit keying, where an expired-but-genuine token should
    /// still count against its user rather than the shared client address.
    #[must_use]
    pub fn peek_subject(&self, token: &str) -> Option<Uuid> {
        let mut validation = self.validation();
        validation.validate_exp = false;
        jsonwebtoken::decode::<AccessClaims>(token, &self.access_decoding, &validation)
            .map(|data| data.claims.sub)
            .ok()
    }

    /// Remaining lifetime of a token given its `exp` claim; `None` when
    /// already past expiry.
    #[must_use]
    pub fn remaining_lifetime(exp: i64) -> Option<Duration> {
        let remaining = exp - Utc::now().timestamp();
        u64::try_from(remaining).ok().map(Duration::from_secs)
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    }
}
