//! Authentication: password hashing and bearer tokens

pub mod password;
mod token;

pub use token::{Claims, TokenSigner};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token is malformed")]
    Malformed,
    #[error("Token signature is invalid")]
    InvalidSignature,
    #[error("Token has expired")]
    Expired,
    #[error("Invalid signing key: {0}")]
    Key(String),
    #[error("Token encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Compare two byte strings without short-circuiting on the first difference
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
