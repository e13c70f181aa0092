use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{CredentialStore, RefreshTokenRecord, User, UserStore};
use crate::error::DatabaseError;

/// PostgreSQL-backed store.
///
/// Every delete is one `DELETE ... WHERE` statement and reports
/// `rows_affected`, so concurrent consumers of the same record are
/// serialized by the row lock.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type RecordRow = (Uuid, String, DateTime<Utc>, DateTime<Utc>);
type UserRow = (Uuid, String, String, String, String, String, DateTime<Utc>);

fn into_record(row: RecordRow) -> RefreshTokenRecord {
    let (subject_id, token_value, expires_at, created_at) = row;
    RefreshTokenRecord {
        subject_id,
        token_value,
        expires_at,
        created_at,
    }
}

fn into_user(row: UserRow) -> User {
    let (id, username, email, password_hash, full_name, bio, created_at) = row;
    User {
        id,
        username,
        email,
        password_hash,
        full_name,
        bio,
        created_at,
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token_value, subject_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&record.token_value)
        .bind(record.subject_id)
        .bind(record.expires_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_one(
        &self,
        subject_id: Uuid,
        token_value: &str,
    ) -> Result<Option<RefreshTokenRecord>, DatabaseError> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT subject_id, token_value, expires_at, created_at
            FROM refresh_tokens
            WHERE subject_id = $1 AND token_value = $2
            "#,
        )
        .bind(subject_id)
        .bind(token_value)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(into_record))
    }

    async fn delete_one(&self, token_value: &str) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_value = $1")
            .bind(token_value)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_matching(
        &self,
        subject_id: Uuid,
        token_value: &str,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "DELETE FROM refresh_tokens WHERE subject_id = $1 AND token_value = $2",
        )
        .bind(subject_id)
        .bind(token_value)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: &User) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, full_name, bio, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.bio)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_login(&self, email_or_username: &str) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, password_hash, full_name, bio, created_at
            FROM users
            WHERE email = $1 OR username = $1
            "#,
        )
        .bind(email_or_username.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(into_user))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, password_hash, full_name, bio, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(into_user))
    }
}
