//! Password hashing with Argon2id.
//!
//! The cost parameters are the argon2 crate defaults and only change with a
//! new release of this crate. bcrypt digests from an earlier deployment are
//! still accepted at login and replaced with Argon2id on success.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use once_cell::sync::Lazy;

/// Hash checked when no account matches, so an unknown email costs the same
/// as a wrong password.
static DUMMY_HASH: Lazy<String> =
    Lazy::new(|| hash_password("accountgate-dummy-password").unwrap_or_default());

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    if is_bcrypt_hash(password_hash) {
        return bcrypt::verify(password, password_hash).unwrap_or(false);
    }

    if let Ok(parsed_hash) = PasswordHash::new(password_hash) {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    } else {
        false
    }
}

/// Burns one verification against a fixed hash. The result is discarded.
pub fn verify_dummy(password: &str) {
    let _ = verify_password(password, &DUMMY_HASH);
}

/// True when `stored` is a PHC string rather than a legacy plaintext value.
pub fn is_password_hash(stored: &str) -> bool {
    PasswordHash::new(stored).is_ok()
}

/// bcrypt digests from an earlier deployment. They cannot be converted
/// without the plaintext, so only a successful login upgrades them.
pub fn is_bcrypt_hash(stored: &str) -> bool {
    ["$2a$", "$2b$", "$2y$"]
        .iter()
        .any(|prefix| stored.starts_with(prefix))
}
