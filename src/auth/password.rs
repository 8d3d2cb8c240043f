//! Password hashing and verification using Argon2id

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::types::GarageError;

/// Minimum accepted password length for new accounts
pub const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password, returning the PHC-formatted string (salt and parameters included)
pub fn hash_password(password: &str) -> Result<String, GarageError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| GarageError::Internal(format!("Failed to hash password: {e}")))
}

/// Check a login attempt against the stored hash.
///
/// A malformed stored hash is a data problem, not a wrong password.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, GarageError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| GarageError::Internal(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
