//! Credential and data protection primitives: password hashing, session tokens
//! and field-level encryption. Nothing in here touches the network or the database.

mod error;
mod field;
mod password;
mod secrets;
mod token;

pub use error::Error;
pub use field::FieldCipher;
pub use password::{MAX_PASSWORD_BYTES, PASSWORD_COST, PasswordHasher};
pub use secrets::SecretMaterial;
pub use token::{Role, SessionClaims, TOKEN_TTL_SECONDS, TokenService};
