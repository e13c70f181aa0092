/// JWT Signing and Verification
///
/// `TokenKeys` is the signing primitive, parameterized by secret, lifetime
/// and issuer. The service holds two independent instances: one for access
/// tokens and one for refresh tokens.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::AppError;

#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_seconds: i64,
    issuer: String,
}

impl TokenKeys {
    pub fn new(secret: &str, ttl_seconds: i64, issuer: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        // TTLs are short; expiry must be exact
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_seconds,
            issuer: issuer.to_string(),
        }
    }

    /// Keys for short-lived access tokens
    pub fn access(config: &JwtSettings) -> Self {
        Self::new(&config.access_secret, config.access_token_expiry, &config.issuer)
    }

    /// Keys for long-lived refresh tokens
    pub fn refresh(config: &JwtSettings) -> Self {
        Self::new(&config.refresh_secret, config.refresh_token_expiry, &config.issuer)
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Sign a fresh token for `subject_id`
    ///
    /// # Errors
    /// Returns an internal error if encoding fails
    pub fn sign(&self, subject_id: Uuid) -> Result<(String, Claims), AppError> {
        let claims = Claims::new(subject_id, self.ttl_seconds, self.issuer.clone());

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        Ok((token, claims))
    }

    /// Validate signature, issuer and expiry and return the claims
    ///
    /// # Errors
    /// Any failure maps to `InvalidToken`
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "JWT validation error");
                AppError::invalid_token()
            })
    }
}
