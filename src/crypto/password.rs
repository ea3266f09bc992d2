use super::Error;

/// bcrypt work factor for stored account passwords.
pub const PASSWORD_COST: u32 = 10;

/// bcrypt only reads this many bytes; longer input is refused rather than cut.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Salted bcrypt hashing for account passwords.
///
/// The output is self-describing (`$2b$10$<salt><digest>`), so the salt and cost
/// travel with the hash and no separate column is needed.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cost: PASSWORD_COST,
        }
    }

    /// # Errors
    /// Returns `Error::PasswordTooLong` above [`MAX_PASSWORD_BYTES`], or an error if the
    /// system random source or bcrypt fails.
    pub fn hash(&self, password: &str) -> Result<String, Error> {
        bcrypt::non_truncating_hash(password, self.cost).map_err(|err| match err {
            bcrypt::BcryptError::Truncation(_) => Error::PasswordTooLong,
            other => Error::Hash(other),
        })
    }

    /// Malformed or unsupported hashes, and passwords bcrypt would truncate, count as a
    /// mismatch.
    #[must_use]
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        bcrypt::non_truncating_verify(password, hash).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_known_password() -> Result<(), Error> {
        let hasher = PasswordHasher::new();
        let hash = hasher.hash("Admin@123")?;

        assert!(hash.starts_with("$2b$10$"));
        assert_ne!(hash, "Admin@123");
        assert!(hasher.verify("Admin@123", &hash));
        assert!(!hasher.verify("wrong", &hash));
        Ok(())
    }

    #[test]
    fn salts_differ_between_calls() -> Result<(), Error> {
        let hasher = PasswordHasher::new();
        let first = hasher.hash("correct horse")?;
        let second = hasher.hash("correct horse")?;

        assert_ne!(first, second);
        assert!(hasher.verify("correct horse", &first));
        assert!(hasher.verify("correct horse", &second));
        Ok(())
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        let hasher = PasswordHasher::new();
        assert!(!hasher.verify("anything", ""));
        assert!(!hasher.verify("anything", "not-a-bcrypt-hash"));
        assert!(!hasher.verify("anything", "$2b$10$short"));
    }

    #[test]
    fn long_passwords_are_refused_not_truncated() -> Result<(), Error> {
        let hasher = PasswordHasher::new();
        let prefix = "a".repeat(MAX_PASSWORD_BYTES);

        assert!(matches!(
            hasher.hash(&format!("{prefix}Y")),
            Err(Error::PasswordTooLong)
        ));

        // A hash of the shared 72-byte prefix must not accept longer passwords.
        let hash = hasher.hash(&prefix)?;
        assert!(hasher.verify(&prefix, &hash));
        assert!(!hasher.verify(&format!("{prefix}X"), &hash));
        Ok(())
    }

    #[test]
    fn multibyte_length_is_counted_in_bytes() {
        let hasher = PasswordHasher::new();
        // 25 three-byte characters: 25 chars, 75 bytes.
        let password = "€".repeat(25);
        assert!(matches!(hasher.hash(&password), Err(Error::PasswordTooLong)));
    }

    #[test]
    fn accepts_2a_prefix() -> Result<(), Error> {
        let hasher = PasswordHasher::new();
        let hash = hasher.hash("legacy")?;
        let legacy = hash.replacen("$2b$", "$2a$", 1);
        assert!(hasher.verify("legacy", &legacy));
        Ok(())
    }
}
