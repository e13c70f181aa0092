/// Token claim set
///
/// Access and refresh tokens carry the same claims and differ only in the
/// secret and lifetime they are signed with.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject id (UUID string)
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    /// Random per token, so two tokens minted in the same second differ
    pub jti: String,
}

impl Claims {
    pub fn new(subject_id: Uuid, ttl_seconds: i64, issuer: String) -> Self {
        Self::issued_at(Utc::now(), subject_id, ttl_seconds, issuer)
    }

    pub fn issued_at(now: DateTime<Utc>, subject_id: Uuid, ttl_seconds: i64, issuer: String) -> Self {
        let iat = now.timestamp();
        Self {
            sub: subject_id.to_string(),
            exp: iat + ttl_seconds,
            iat,
            iss: issuer,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// # Errors
    /// A signed token whose subject is not a UUID is treated as invalid.
    pub fn subject_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::invalid_token())
    }

    pub fn expires_at(&self) -> Result<DateTime<Utc>, AppError> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .ok_or_else(|| AppError::Internal(format!("Expiry {} out of range", self.exp)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_is_applied_to_issue_time() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let subject_id = Uuid::new_v4();
        let claims = Claims::issued_at(now, subject_id, 900, "feed".to_string());

        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.exp, 1_700_000_900);
        assert_eq!(claims.subject_id().unwrap(), subject_id);
        assert_eq!(claims.expires_at().unwrap(), now + chrono::Duration::seconds(900));
    }

    #[test]
    fn test_jti_differs_between_tokens() {
        let subject_id = Uuid::new_v4();
        let first = Claims::new(subject_id, 60, "feed".to_string());
        let second = Claims::new(subject_id, 60, "feed".to_string());

        assert_ne!(first.jti, second.jti);
    }

    #[test]
    fn test_non_uuid_subject_is_an_invalid_token() {
        let mut claims = Claims::new(Uuid::new_v4(), 3600, "feed".to_string());
        claims.sub = "42".to_string();

        let err = claims.subject_id().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidToken);
    }
}
