use thiserror::Error;

pub type CryptResult<T> = std::result::Result<T, CryptError>;

/// Failures from the password-hashing and token layers, collapsed into one
/// type so the web layer can map them to a single 500.
#[derive(Debug, Error)]
pub enum CryptError {
    #[error("password hash error: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}
