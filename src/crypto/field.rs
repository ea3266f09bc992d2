//! AES-256-GCM envelope encryption for single sensitive fields.
//!
//! Envelope layout: `base64(nonce (12 bytes) || ciphertext || tag (16 bytes))`,
//! standard alphabet with padding. No associated data is bound.

use super::{Error, SecretMaterial};
use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64ct::{Base64, Encoding};
use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretBox};
use std::sync::Arc;

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

const KEY_PAD: u8 = b'0';

/// Encrypts and decrypts one sensitive string at a time (the SSN column).
///
/// The cipher knows nothing about masking or authorization; callers decide what
/// to reveal.
#[derive(Debug, Clone)]
pub struct FieldCipher {
    secrets: Arc<SecretMaterial>,
}

impl FieldCipher {
    #[must_use]
    pub fn new(secrets: Arc<SecretMaterial>) -> Self {
        Self { secrets }
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    ///
    /// # Errors
    /// Returns `Error::Encryption` if the random source or the cipher fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, Error> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|_| Error::Encryption)?;

        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| Error::Encryption)?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&ciphertext);

        Ok(Base64::encode_string(&envelope))
    }

    /// Decrypt an envelope produced by [`FieldCipher::encrypt`].
    ///
    /// # Errors
    /// Returns `Error::DecryptionFailed` if the envelope is not valid base64, is too
    /// short, fails tag verification, or does not hold UTF-8.
    pub fn decrypt(&self, envelope: &str) -> Result<String, Error> {
        let data = Base64::decode_vec(envelope.trim()).map_err(|_| Error::DecryptionFailed)?;
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::DecryptionFailed);
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = self
            .cipher()
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| Error::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| Error::DecryptionFailed)
    }

    fn cipher(&self) -> Aes256Gcm {
        let key = derive_key(self.secrets.encryption_key());
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.expose_secret()))
    }
}

/// Right-pad with ASCII `'0'` and truncate to 32 bytes.
///
/// Kept byte-compatible with records encrypted before this service existed; a short
/// configured key therefore yields a low-entropy AES key.
fn derive_key(material: &[u8]) -> SecretBox<[u8; KEY_LEN]> {
    let mut key = Box::new([KEY_PAD; KEY_LEN]);
    let take = material.len().min(KEY_LEN);
    key[..take].copy_from_slice(&material[..take]);
    SecretBox::new(key)
}
