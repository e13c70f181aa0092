/// Authentication module
///
/// Handles JWT signing/verification, password hashing, token pair minting
/// and refresh token rotation.

mod claims;
mod issuer;
mod jwt;
mod password;
mod refresh_token;
mod verifier;

pub use claims::Claims;
pub use issuer::{TokenIssuer, TokenPair};
pub use jwt::TokenKeys;
pub use password::{hash_password, verify_password};
pub use refresh_token::RefreshCoordinator;
pub use verifier::{extract_bearer, verify_request, AuthenticatedSubject};
