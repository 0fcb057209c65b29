//! Symmetric encryption for credentials kept in configuration.
//!
//! Tokens are Fernet (AES-128-CBC with an HMAC-SHA256 tag, URL-safe base64),
//! so values produced by any other Fernet implementation decrypt here and
//! the other way round. There is no key derivation or rotation: the key is
//! the 32-byte URL-safe base64 string returned by [`generate_key`].

use std::fmt;

use fernet::Fernet;
use thiserror::Error;

/// Errors from the credential cipher.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptError {
    #[error("Invalid key: expected 32 bytes of URL-safe base64")]
    InvalidKey,

    #[error("Invalid token: wrong key or tampered ciphertext")]
    InvalidToken,

    #[error("Decrypted value is not valid UTF-8")]
    InvalidUtf8,
}

/// A Fernet cipher bound to one key.
pub struct Cipher {
    fernet: Fernet,
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

impl Cipher {
    /// Create a cipher from a URL-safe base64 key.
    pub fn new(key: &str) -> Result<Self, CryptError> {
        Fernet::new(key.trim())
            .map(|fernet| Self { fernet })
            .ok_or(CryptError::InvalidKey)
    }

    /// Encrypt a plaintext into a URL-safe token.
    pub fn encrypt(&self, plaintext: &str) -> String {
        self.fernet.encrypt(plaintext.as_bytes())
    }

    /// Decrypt a token produced with the same key.
    pub fn decrypt(&self, token: &str) -> Result<String, CryptError> {
        let bytes = self
            .fernet
            .decrypt(token.trim())
            .map_err(|_| CryptError::InvalidToken)?;
        String::from_utf8(bytes).map_err(|_| CryptError::InvalidUtf8)
    }
}

/// Generate a fresh random key.
pub fn generate_key() -> String {
    Fernet::generate_key()
}

/// Encrypt `plaintext` with `key`.
pub fn encode(key: &str, plaintext: &str) -> Result<String, CryptError> {
    Ok(Cipher::new(key)?.encrypt(plaintext))
}

/// Decrypt `ciphertext` with `key`.
pub fn decode(key: &str, ciphertext: &str) -> Result<String, CryptError> {
    Cipher::new(key)?.decrypt(ciphertext)
}
