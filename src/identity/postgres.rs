//! `PostgreSQL` implementation of the identity store.

use super::{Credential, Identity, IdentityStore, InsertOutcome, NewIdentity, Role};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use tracing::Instrument;
use uuid::Uuid;

pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// SQLSTATE 23505, with the violated constraint's name when the driver
/// reports one.
fn unique_violation(err: &sqlx::Error) -> Option<String> {
    if let sqlx::Error::Database(db_err) = err {
        if db_err.code().as_deref() == Some("23505") {
            return Some(db_err.constraint().unwrap_or_default().to_string());
        }
    }
    None
}

fn identity_from_row(row: &sqlx::postgres::PgRow) -> Result<Identity> {
    let role: String = row.get("role");
    Ok(Identity {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        role: Role::from_str(&role)?,
        is_active: row.get("is_active"),
        password_changed_at: row.get("password_changed_at"),
    })
}

const IDENTITY_COLUMNS: &str = "id, email, username, role::text AS role, is_active, password_changed_at";

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>> {
        let query =
            format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by id")?;

        row.as_ref().map(identity_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>> {
        let query = format!(
            "SELECT {IDENTITY_COLUMNS}, password_hash FROM users WHERE email = $1"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by email")?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Credential {
            identity: identity_from_row(&row)?,
            password_hash: row.get("password_hash"),
        }))
    }

    async fn insert(&self, new: NewIdentity) -> Result<InsertOutcome> {
        let query = format!(
            r"
            INSERT INTO users (email, username, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {IDENTITY_COLUMNS}
            "
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(&new.email)
            .bind(&new.username)
            .bind(&new.password_hash)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(InsertOutcome::Created(identity_from_row(&row)?)),
            Err(err) => match unique_violation(&err) {
                Some(constraint) if constraint.contains("username") => {
                    Ok(InsertOutcome::UsernameTaken)
                }
                Some(_) => Ok(InsertOutcome::EmailTaken),
                None => Err(err).context("failed to insert user"),
            },
        }
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let query = r"
            UPDATE users
            SET password_hash = $2,
                password_changed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update password")?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let query = "SELECT 1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("database ping failed")?;
        Ok(())
    }
}
