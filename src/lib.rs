//! # Gatekeeper (Token & Rate-Limit Authority)
//!
//! `gatekeeper` is the authentication front door of the code review platform.
//! It issues and verifies signed access/refresh token pairs, tracks active
//! sessions per user and device, and throttles abusive traffic with
//! counter-based rate limiting and login lockouts.
//!
//! ## Token lifecycle
//!
//! Access tokens are stateless HS256 JWTs carrying identity and role claims;
//! they are only invalidated early through an explicit revocation entry whose
//! TTL mirrors the token's remaining lifetime. Refresh tokens are persisted
//! server-side (hash only) with exactly one live refresh token per user: a new
//! issuance silently replaces the previous one.
//!
//! ## Rate limiting
//!
//! Every request is admitted or rejected before authentication by a
//! counter-per-window limiter keyed on the authenticated user (when the bearer
//! signature verifies) or the client address. Windows are rolling: the TTL is
//! attached on the first increment, not aligned to the clock. The limiter
//! fails open when the counter store is unreachable; token verification fails
//! closed.
//!
//! ## Stores
//!
//! User records live in `PostgreSQL`. Counters, sessions, revocations, and
//! refresh-token hashes live in a shared key-value store (Redis in
//! production), accessed through an explicit [`store::KeyValueStore`] trait so
//! deployments without Redis degrade to in-memory or no-op behavior instead of
//! crashing.

pub mod api;
pub mod cli;
pub mod guard;
pub mod identity;
pub mod limiter;
pub mod session;
pub mod store;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
