use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid token")]
    TokenInvalid,
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("missing configuration: {0}")]
    ConfigurationMissing(&'static str),
    #[error("invalid key length")]
    KeyLength,
    #[error("encryption failed")]
    Encryption,
    #[error("password exceeds 72 bytes")]
    PasswordTooLong,
    #[error("password hashing failed")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
}
