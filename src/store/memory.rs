use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::{CredentialStore, RefreshTokenRecord, User, UserStore};
use crate::error::DatabaseError;

/// In-process store backed by concurrent maps.
///
/// `DashMap::remove_if` takes the shard write lock for the duration of the
/// check, which gives `delete_matching` its remove-and-report atomicity.
#[derive(Default)]
pub struct MemoryStore {
    refresh_tokens: DashMap<String, RefreshTokenRecord>,
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_token_count(&self) -> usize {
        self.refresh_tokens.len()
    }

    pub fn contains_refresh_token(&self, token_value: &str) -> bool {
        self.refresh_tokens.contains_key(token_value)
    }

    pub fn refresh_tokens_for(&self, subject_id: Uuid) -> Vec<RefreshTokenRecord> {
        self.refresh_tokens
            .iter()
            .filter(|entry| entry.subject_id == subject_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn users(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, User>>, DatabaseError> {
        self.users
            .lock()
            .map_err(|_| DatabaseError::Unavailable("user table lock poisoned".to_string()))
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), DatabaseError> {
        match self.refresh_tokens.entry(record.token_value.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(
                DatabaseError::UniqueConstraintViolation("refresh token already stored".to_string()),
            ),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn find_one(
        &self,
        subject_id: Uuid,
        token_value: &str,
    ) -> Result<Option<RefreshTokenRecord>, DatabaseError> {
        Ok(self
            .refresh_tokens
            .get(token_value)
            .filter(|record| record.subject_id == subject_id)
            .map(|record| record.value().clone()))
    }

    async fn delete_one(&self, token_value: &str) -> Result<u64, DatabaseError> {
        Ok(self.refresh_tokens.remove(token_value).map_or(0, |_| 1))
    }

    async fn delete_matching(
        &self,
        subject_id: Uuid,
        token_value: &str,
    ) -> Result<u64, DatabaseError> {
        Ok(self
            .refresh_tokens
            .remove_if(token_value, |_, record| record.subject_id == subject_id)
            .map_or(0, |_| 1))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let before = self.refresh_tokens.len();
        self.refresh_tokens.retain(|_, record| !record.is_expired(now));
        Ok(before.saturating_sub(self.refresh_tokens.len()) as u64)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<(), DatabaseError> {
        let mut users = self.users()?;
        let taken = users
            .values()
            .any(|existing| existing.email == user.email || existing.username == user.username);
        if taken {
            return Err(DatabaseError::UniqueConstraintViolation(
                "Email or username already exists".to_string(),
            ));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_login(&self, email_or_username: &str) -> Result<Option<User>, DatabaseError> {
        let needle = email_or_username.to_lowercase();
        Ok(self
            .users()?
            .values()
            .find(|user| user.email == needle || user.username == needle)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(self.users()?.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn record(subject_id: Uuid, token: &str, ttl: i64) -> RefreshTokenRecord {
        let now = Utc::now();
        RefreshTokenRecord {
            subject_id,
            token_value: token.to_string(),
            expires_at: now + Duration::seconds(ttl),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_find_requires_matching_subject() {
        let store = MemoryStore::new();
        let subject = Uuid::new_v4();
        store.create(&record(subject, "tok", 60)).await.unwrap();

        assert!(store.find_one(subject, "tok").await.unwrap().is_some());
        assert!(store.find_one(Uuid::new_v4(), "tok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_one_reports_removal() {
        let store = MemoryStore::new();
        store.create(&record(Uuid::new_v4(), "tok", 60)).await.unwrap();

        assert_eq!(store.delete_one("tok").await.unwrap(), 1);
        assert_eq!(store.delete_one("tok").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_matching_ignores_other_subjects() {
        let store = MemoryStore::new();
        let subject = Uuid::new_v4();
        store.create(&record(subject, "tok", 60)).await.unwrap();

        assert_eq!(store.delete_matching(Uuid::new_v4(), "tok").await.unwrap(), 0);
        assert!(store.contains_refresh_token("tok"));
        assert_eq!(store.delete_matching(subject, "tok").await.unwrap(), 1);
        assert!(!store.contains_refresh_token("tok"));
    }

    #[tokio::test]
    async fn test_concurrent_delete_matching_removes_once() {
        let store = Arc::new(MemoryStore::new());
        let subject = Uuid::new_v4();
        store.create(&record(subject, "tok", 60)).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.delete_matching(subject, "tok").await.unwrap() })
            })
            .collect();

        let mut removed = 0;
        for handle in handles {
            removed += handle.await.unwrap();
        }
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_same_subject_keeps_multiple_sessions() {
        let store = MemoryStore::new();
        let subject = Uuid::new_v4();
        store.create(&record(subject, "phone", 60)).await.unwrap();
        store.create(&record(subject, "laptop", 60)).await.unwrap();

        assert_eq!(store.refresh_tokens_for(subject).len(), 2);
    }

    #[tokio::test]
    async fn test_delete_expired_keeps_live_records() {
        let store = MemoryStore::new();
        let subject = Uuid::new_v4();
        store.create(&record(subject, "old", -10)).await.unwrap();
        store.create(&record(subject, "new", 60)).await.unwrap();

        assert_eq!(store.delete_expired(Utc::now()).await.unwrap(), 1);
        assert!(store.contains_refresh_token("new"));
        assert!(!store.contains_refresh_token("old"));
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected() {
        let store = MemoryStore::new();
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "hash".to_string(),
            full_name: "Alice".to_string(),
            bio: String::new(),
            created_at: Utc::now(),
        };
        store.create_user(&user).await.unwrap();

        let mut twin = user.clone();
        twin.id = Uuid::new_v4();
        twin.email = "other@example.com".to_string();
        let result = store.create_user(&twin).await;
        assert!(matches!(result, Err(DatabaseError::UniqueConstraintViolation(_))));

        let found = store.find_by_login("ALICE@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
    }
}
