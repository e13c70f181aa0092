/// Refresh Token Rotation
///
/// Refresh tokens are:
/// - Signed JWTs (refresh secret) whose full string is the store key
/// - Single-use: a successful rotation consumes the presented record
/// - Revocable: deleting the record kills the token even though its
///   signature still verifies

use uuid::Uuid;

use crate::auth::issuer::{TokenIssuer, TokenPair};
use crate::error::AppError;

#[derive(Clone)]
pub struct RefreshCoordinator {
    issuer: TokenIssuer,
}

impl RefreshCoordinator {
    pub fn new(issuer: TokenIssuer) -> Self {
        Self { issuer }
    }

    /// Exchange a refresh token for a brand-new pair.
    ///
    /// The consume step is a single atomic delete; when several callers
    /// present the same token at once only the one that actually removed
    /// the record gets a new pair.
    ///
    /// # Errors
    /// - `InvalidToken` if the token fails verification or its record is gone
    /// - `StoreUnavailable` if the store cannot be reached
    pub async fn rotate(&self, presented: &str) -> Result<(Uuid, TokenPair), AppError> {
        let claims = self.issuer.refresh_keys().verify(presented)?;
        let subject_id = claims.subject_id()?;

        let removed = self
            .issuer
            .store()
            .delete_matching(subject_id, presented)
            .await?;

        if removed == 0 {
            // Signed and unexpired but no longer on record: revoked or
            // already rotated. Other sessions of the subject are left alone.
            tracing::warn!(
                subject_id = %subject_id,
                jti = %claims.jti,
                "Refresh token presented after revocation or rotation"
            );
            return Err(AppError::invalid_token());
        }

        let pair = self.issuer.mint(subject_id).await?;

        tracing::info!(subject_id = %subject_id, "Refresh token rotated");

        Ok((subject_id, pair))
    }

    /// Delete the record for `token_value` if present.
    ///
    /// Succeeds whether or not a record existed.
    pub async fn invalidate(&self, token_value: &str) -> Result<(), AppError> {
        let removed = self.issuer.store().delete_one(token_value).await?;

        tracing::debug!(removed = removed, "Refresh token invalidated");
        Ok(())
    }
}
