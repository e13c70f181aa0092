/// Access Token Verification
///
/// Stateless per-request check of the `Authorization` header. Never touches
/// the credential store, so an access token stays valid until it expires.

use uuid::Uuid;

use crate::auth::jwt::TokenKeys;
use crate::error::{AppError, AuthError};

/// The subject a request was authenticated as.
///
/// Inserted into request extensions by the JWT middleware and read by
/// handlers through `web::ReqData<AuthenticatedSubject>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedSubject(pub Uuid);

impl AuthenticatedSubject {
    pub fn id(&self) -> Uuid {
        self.0
    }
}

/// Pull the token out of a `Bearer <token>` header value.
///
/// # Errors
/// `Unauthenticated` when the header is missing or not of that shape
pub fn extract_bearer(header: Option<&str>) -> Result<&str, AppError> {
    let token = header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(AuthError::MissingToken)?;

    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::MissingToken.into());
    }

    Ok(token)
}

/// Authenticate a request from its `Authorization` header value.
///
/// # Errors
/// - `Unauthenticated` if no well-formed bearer credential is present
/// - `InvalidToken` if the signature, issuer or expiry check fails
pub fn verify_request(
    header: Option<&str>,
    keys: &TokenKeys,
) -> Result<AuthenticatedSubject, AppError> {
    let token = extract_bearer(header)?;
    let claims = keys.verify(token)?;
    Ok(AuthenticatedSubject(claims.subject_id()?))
}
