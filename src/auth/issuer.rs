/// Token Issuer
///
/// Mints access/refresh token pairs and persists one refresh record per
/// pair.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::jwt::TokenKeys;
use crate::configuration::JwtSettings;
use crate::error::AppError;
use crate::store::{CredentialStore, RefreshTokenRecord};

/// A freshly minted credential pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenIssuer {
    access: TokenKeys,
    refresh: TokenKeys,
    store: Arc<dyn CredentialStore>,
}

impl TokenIssuer {
    pub fn new(config: &JwtSettings, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            access: TokenKeys::access(config),
            refresh: TokenKeys::refresh(config),
            store,
        }
    }

    pub fn access_keys(&self) -> &TokenKeys {
        &self.access
    }

    pub fn refresh_keys(&self) -> &TokenKeys {
        &self.refresh
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Mint a new pair for `subject_id`.
    ///
    /// Existing records for the subject are left untouched; every call adds
    /// exactly one record.
    ///
    /// # Errors
    /// `StoreUnavailable` if the record cannot be persisted
    pub async fn mint(&self, subject_id: Uuid) -> Result<TokenPair, AppError> {
        let (access_token, _) = self.access.sign(subject_id)?;
        let (refresh_token, refresh_claims) = self.refresh.sign(subject_id)?;

        let refresh_expires_at = refresh_claims.expires_at()?;

        let record = RefreshTokenRecord {
            subject_id,
            token_value: refresh_token.clone(),
            expires_at: refresh_expires_at,
            created_at: Utc::now(),
        };
        self.store.create(&record).await?;

        tracing::debug!(subject_id = %subject_id, "Token pair minted");

        Ok(TokenPair {
            access_token,
            refresh_token,
            refresh_expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn test_config() -> JwtSettings {
        JwtSettings {
            access_secret: "issuer-access-secret".to_string(),
            refresh_secret: "issuer-refresh-secret".to_string(),
            access_token_expiry: 60,
            refresh_token_expiry: 3600,
            issuer: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mint_binds_both_tokens_to_subject() {
        let store = Arc::new(MemoryStore::new());
        let issuer = TokenIssuer::new(&test_config(), store.clone());
        let subject_id = Uuid::new_v4();

        let pair = issuer.mint(subject_id).await.unwrap();

        let access = issuer.access_keys().verify(&pair.access_token).unwrap();
        let refresh = issuer.refresh_keys().verify(&pair.refresh_token).unwrap();
        assert_eq!(access.subject_id().unwrap(), subject_id);
        assert_eq!(refresh.subject_id().unwrap(), subject_id);

        assert_eq!(store.refresh_token_count(), 1);
        let record = store
            .find_one(subject_id, &pair.refresh_token)
            .await
            .unwrap()
            .expect("record stored");
        assert_eq!(record.expires_at, pair.refresh_expires_at);
    }

    #[tokio::test]
    async fn test_mint_never_dedupes() {
        let store = Arc::new(MemoryStore::new());
        let issuer = TokenIssuer::new(&test_config(), store.clone());
        let subject_id = Uuid::new_v4();

        let first = issuer.mint(subject_id).await.unwrap();
        let second = issuer.mint(subject_id).await.unwrap();

        assert_ne!(first.refresh_token, second.refresh_token);
        assert_eq!(store.refresh_tokens_for(subject_id).len(), 2);
    }
}
