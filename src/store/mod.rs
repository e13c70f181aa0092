/// Persistence module
///
/// Defines the storage contracts the session core depends on and ships two
/// implementations: PostgreSQL for deployments and an in-memory store for
/// tests and local runs.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::DatabaseError;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A persisted refresh token.
///
/// `token_value` is the full signed token string and doubles as the lookup
/// key. The record's presence is what keeps the token usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub subject_id: Uuid,
    pub token_value: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Account data needed to authenticate a subject
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
}

/// Storage for refresh token records.
///
/// Records are keyed by token value, never by subject, so one subject may
/// hold any number of concurrent sessions.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), DatabaseError>;

    async fn find_one(
        &self,
        subject_id: Uuid,
        token_value: &str,
    ) -> Result<Option<RefreshTokenRecord>, DatabaseError>;

    /// Remove the record with this token value if present and return the
    /// number of records removed (0 or 1).
    async fn delete_one(&self, token_value: &str) -> Result<u64, DatabaseError>;

    /// Remove the record only if it belongs to `subject_id`, as a single
    /// atomic operation. Exactly one of any number of concurrent callers for
    /// the same record observes `1`.
    async fn delete_matching(&self, subject_id: Uuid, token_value: &str)
        -> Result<u64, DatabaseError>;

    /// Purge records whose expiry is at or before `now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails with `UniqueConstraintViolation` when the
    /// email or username is taken.
    async fn create_user(&self, user: &User) -> Result<(), DatabaseError>;

    /// Look a user up by email or username (both stored lower-cased).
    async fn find_by_login(&self, email_or_username: &str) -> Result<Option<User>, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;
}
