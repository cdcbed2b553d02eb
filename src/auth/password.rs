//! Salted password hashing

use sha2::{Digest, Sha256};

/// Generate a fresh random salt
pub fn generate_salt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Lowercase hex SHA-256 of `salt || password`
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn verify_password(salt: &str, password: &str, expected_hash: &str) -> bool {
    let actual = hash_password(salt, password);
    super::constant_time_eq(actual.as_bytes(), expected_hash.as_bytes())
}
