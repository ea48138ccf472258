//! In-process identity store for tests and single-binary dev mode.

use super::{Credential, Identity, IdentityStore, InsertOutcome, NewIdentity, Role};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryIdentityStore {
    users: Mutex<HashMap<Uuid, Credential>>,
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Promote an existing identity to a role. Test/dev helper; production
    /// role changes go through the database directly.
    pub async fn set_role(&self, id: Uuid, role: Role) {
        let mut users = self.users.lock().await;
        if let Some(credential) = users.get_mut(&id) {
            credential.identity.role = role;
        }
    }

    /// Deactivate an identity without deleting it.
    pub async fn set_active(&self, id: Uuid, is_active: bool) {
        let mut users = self.users.lock().await;
        if let Some(credential) = users.get_mut(&id) {
            credential.identity.is_active = is_active;
        }
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>> {
        let users = self.users.lock().await;
        Ok(users.get(&id).map(|c| c.identity.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>> {
        let users = self.users.lock().await;
        Ok(users
            .values()
            .find(|c| c.identity.email == email)
            .cloned())
    }

    async fn insert(&self, new: NewIdentity) -> Result<InsertOutcome> {
        let mut users = self.users.lock().await;
        if users.values().any(|c| c.identity.email == new.email) {
            return Ok(InsertOutcome::EmailTaken);
        }
        if users.values().any(|c| c.identity.username == new.username) {
            return Ok(InsertOutcome::UsernameTaken);
        }
        let identity = Identity {
            id: Uuid::new_v4(),
            email: new.email,
            username: new.username,
            role: Role::User,
            is_active: true,
            password_changed_at: None,
        };
        users.insert(
            identity.id,
            Credential {
                identity: identity.clone(),
                password_hash: new.password_hash,
            },
        );
        Ok(InsertOutcome::Created(identity))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let mut users = self.users.lock().await;
        if let Some(credential) = users.get_mut(&id) {
            credential.password_hash = password_hash.to_string();
            credential.identity.password_changed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, username: &str) -> NewIdentity {
        NewIdentity {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "$argon2id$fake".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_and_lookup() -> Result<()> {
        let store = MemoryIdentityStore::new();
        let outcome = store.insert(new_user("alice@example.com", "alice")).await?;
        let InsertOutcome::Created(identity) = outcome else {
            panic!("expected Created");
        };
        assert_eq!(identity.role, Role::User);
        assert!(identity.is_active);
        assert!(identity.password_changed_at.is_none());

        let found = store.find_by_id(identity.id).await?.unwrap();
        assert_eq!(found.email, "alice@example.com");

        let credential = store.find_by_email("alice@example.com").await?.unwrap();
        assert_eq!(credential.password_hash, "$argon2id$fake");
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_email_and_username_are_outcomes() -> Result<()> {
        let store = MemoryIdentityStore::new();
        store.insert(new_user("alice@example.com", "alice")).await?;

        let outcome = store.insert(new_user("alice@example.com", "other")).await?;
        assert!(matches!(outcome, InsertOutcome::EmailTaken));

        let outcome = store.insert(new_user("other@example.com", "alice")).await?;
        assert!(matches!(outcome, InsertOutcome::UsernameTaken));
        Ok(())
    }

    #[tokio::test]
    async fn update_password_bumps_changed_at() -> Result<()> {
        let store = MemoryIdentityStore::new();
        let InsertOutcome::Created(identity) =
            store.insert(new_user("alice@example.com", "alice")).await?
        else {
            panic!("expected Created");
        };

        store.update_password(identity.id, "$argon2id$new").await?;
        let found = store.find_by_id(identity.id).await?.unwrap();
        assert!(found.password_changed_at.is_some());

        let credential = store.find_by_email("alice@example.com").await?.unwrap();
        assert_eq!(credential.password_hash, "$argon2id$new");
        Ok(())
    }
}
