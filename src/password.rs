//! Password hashing with bcrypt.
//!
//! Hashing and verification are CPU-bound, so both run on the blocking pool.

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Errors from hashing or verifying a password.
#[derive(Debug)]
pub enum PasswordError {
    Bcrypt(bcrypt::BcryptError),
    Join(tokio::task::JoinError),
}

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordError::Bcrypt(e) => write!(f, "bcrypt error: {}", e),
            PasswordError::Join(e) => write!(f, "Task join error: {}", e),
        }
    }
}

impl std::error::Error for PasswordError {}

/// Hash a password with the given bcrypt cost.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, PasswordError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(PasswordError::Join)?
        .map_err(PasswordError::Bcrypt)
}

/// Check a password against a stored bcrypt hash.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(PasswordError::Join)?
        .map_err(PasswordError::Bcrypt)
}
