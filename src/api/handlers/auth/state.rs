use crate::crypto::{PasswordHasher, TokenService};
use std::sync::OnceLock;

// Hashed on first use so unknown-user logins cost the same bcrypt round as real ones.
const DUMMY_PASSWORD: &str = "custodian-timing-equalizer";

/// Token issuing/verification plus password hashing, shared by the auth handlers.
#[derive(Debug)]
pub struct AuthState {
    tokens: TokenService,
    passwords: PasswordHasher,
    dummy_hash: OnceLock<String>,
}

impl AuthState {
    #[must_use]
    pub fn new(tokens: TokenService, passwords: PasswordHasher) -> Self {
        Self {
            tokens,
            passwords,
            dummy_hash: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    #[must_use]
    pub fn passwords(&self) -> PasswordHasher {
        self.passwords
    }

    /// A well-formed hash that matches no real password. `None` only if bcrypt itself fails.
    pub(crate) fn dummy_hash(&self) -> Option<&str> {
        if let Some(hash) = self.dummy_hash.get() {
            return Some(hash);
        }
        let hash = self.passwords.hash(DUMMY_PASSWORD).ok()?;
        Some(self.dummy_hash.get_or_init(|| hash).as_str())
    }
}
