/// Password hashing (bcrypt)
///
/// Both functions are CPU bound; handlers run them through `web::block`.

use crate::error::{AppError, ValidationError};

const MIN_LEN: usize = 6;
// bcrypt only looks at the first 72 bytes
const MAX_LEN: usize = 72;

/// # Errors
/// `Validation` when the password length is outside 6..=72 bytes
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    match password.len() {
        n if n < MIN_LEN => Err(ValidationError::TooShort("password".to_string(), MIN_LEN).into()),
        n if n > MAX_LEN => Err(ValidationError::TooLong("password".to_string(), MAX_LEN).into()),
        _ => bcrypt::hash(password, cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e))),
    }
}

/// `Ok(false)` on mismatch; `Err` only if the stored hash is unreadable.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    bcrypt::verify(password, password_hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}
