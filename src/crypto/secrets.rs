use super::Error;
use secrecy::{ExposeSecret, SecretString};

/// Process-wide secrets: the token signing secret and the field encryption key.
///
/// Built once at startup and shared behind an `Arc`; nothing mutates it afterwards.
pub struct SecretMaterial {
    signing_secret: SecretString,
    encryption_key: SecretString,
}

impl SecretMaterial {
    /// # Errors
    /// Returns `Error::ConfigurationMissing` if either secret is empty.
    pub fn new(signing_secret: SecretString, encryption_key: SecretString) -> Result<Self, Error> {
        if signing_secret.expose_secret().trim().is_empty() {
            return Err(Error::ConfigurationMissing("signing secret"));
        }

        if encryption_key.expose_secret().trim().is_empty() {
            return Err(Error::ConfigurationMissing("encryption key"));
        }

        Ok(Self {
            signing_secret,
            encryption_key,
        })
    }

    pub(crate) fn signing_secret(&self) -> &[u8] {
        self.signing_secret.expose_secret().as_bytes()
    }

    pub(crate) fn encryption_key(&self) -> &[u8] {
        self.encryption_key.expose_secret().as_bytes()
    }
}

impl std::fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretMaterial")
            .field("signing_secret", &"***")
            .field("encryption_key", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_signing_secret() {
        let result = SecretMaterial::new(SecretString::from(""), SecretString::from("key"));
        assert!(matches!(
            result,
            Err(Error::ConfigurationMissing("signing secret"))
        ));
    }

    #[test]
    fn rejects_blank_encryption_key() {
        let result = SecretMaterial::new(SecretString::from("secret"), SecretString::from("   "));
        assert!(matches!(
            result,
            Err(Error::ConfigurationMissing("encryption key"))
        ));
    }

    #[test]
    fn debug_redacts_secrets() -> Result<(), Error> {
        let secrets = SecretMaterial::new(
            SecretString::from("top-signing-secret"),
            SecretString::from("top-encryption-key"),
        )?;
        let debug = format!("{secrets:?}");
        assert!(!debug.contains("top-signing-secret"));
        assert!(!debug.contains("top-encryption-key"));
        Ok(())
    }
}
