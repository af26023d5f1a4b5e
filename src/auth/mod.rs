use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug)]
pub enum PasswordError {
    Hashing(String),
    Worker(String),
}

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordError::Hashing(msg) => write!(f, "Password hashing error: {}", msg),
            PasswordError::Worker(msg) => write!(f, "Password worker failed: {}", msg),
        }
    }
}

impl std::error::Error for PasswordError {}

/// Salted bcrypt hash, computed on the blocking pool.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, PasswordError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| PasswordError::Worker(e.to_string()))?
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

/// Malformed stored hashes count as a mismatch.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let password = password.to_string();
    let hash = hash.to_string();
    let outcome = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| PasswordError::Worker(e.to_string()))?;
    Ok(outcome.unwrap_or(false))
}

/// Opaque token handed to the client in the session cookie
pub fn new_session_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Only the hash of a session token is ever stored.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
