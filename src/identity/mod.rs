//! Identity store boundary.
//!
//! User records are the only durable state this service owns; everything else
//! (counters, sessions, revocations) lives in the key-value store. Production
//! uses `PostgreSQL` via [`PgIdentityStore`]; tests and single-binary dev mode
//! use [`MemoryIdentityStore`].

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

mod memory;
mod postgres;

pub use memory::MemoryIdentityStore;
pub use postgres::PgIdentityStore;

/// Role attached to every identity, ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "moderator" => Ok(Self::Moderator),
            "admin" => Ok(Self::Admin),
            other => Err(anyhow::anyhow!("unknown role: {other}")),
        }
    }
}

/// Public view of a user record. The password hash never leaves the store
/// except through [`Credential`] during login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub is_active: bool,
    pub password_changed_at: Option<DateTime<Utc>>,
}

/// Input for creating a user record. The password is already hashed by the
/// caller; stores never see plaintext.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

/// Identity plus its password hash, for credential verification only.
#[derive(Debug, Clone)]
pub struct Credential {
    pub identity: Identity,
    pub password_hash: String,
}

/// Outcome of an insert attempt; uniqueness conflicts are outcomes, not
/// errors, so handlers can map them to field-level responses.
#[derive(Debug)]
pub enum InsertOutcome {
    Created(Identity),
    EmailTaken,
    UsernameTaken,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>>;

    /// Lookup by email, returning the password hash for verification.
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>>;

    async fn insert(&self, new: NewIdentity) -> Result<InsertOutcome>;

    /// Replace the password hash and bump `password_changed_at`, which
    /// invalidates every access token issued before the change.
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trips_through_strings() -> Result<()> {
        for role in [Role::User, Role::Moderator, Role::Admin] {
            assert_eq!(Role::from_str(role.as_str())?, role);
        }
        assert!(Role::from_str("root").is_err());
        Ok(())
    }

    #[test]
    fn role_ordering_matches_privilege() {
        assert!(Role::User < Role::Moderator);
        assert!(Role::Moderator < Role::Admin);
    }

    #[test]
    fn role_serializes_lowercase() -> Result<()> {
        assert_eq!(serde_json::to_string(&Role::Admin)?, "\"admin\"");
        let role: Role = serde_json::from_str("\"moderator\"")?;
        assert_eq!(role, Role::Moderator);
        Ok(())
    }
}
