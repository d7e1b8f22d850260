//! ChaCha20-Poly1305 encryption provider for `Veilstore`.
//!
//! The payload object is serialized to JSON and sealed with a fresh random
//! nonce. The envelope value is a base64 string:
//!
//! ```text
//! [version:1][nonce:12][ciphertext+tag:N]
//! ```

#![warn(clippy::pedantic, clippy::nursery)]

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    ChaCha20Poly1305, Nonce,
};
use secrecy::{ExposeSecret, SecretVec};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use veilstore::error::ProviderError;
use veilstore::provider::EncryptionProvider;
use zeroize::Zeroizing;

/// Blob format version.
pub const BLOB_VERSION: u8 = 1;

/// Key size in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Nonce size for ChaCha20-Poly1305 (96 bits).
const NONCE_SIZE: usize = 12;

/// Encryption provider sealing payloads with ChaCha20-Poly1305.
///
/// # Example
///
/// ```
/// use veilstore::provider::EncryptionProvider;
/// use veilstore_aead::AeadProvider;
///
/// let provider = AeadProvider::generate();
/// let payload = serde_json::json!({"ssn": "123"});
///
/// let blob = provider.encrypt(payload.as_object().unwrap()).unwrap();
/// let opened = provider.decrypt(&blob).unwrap();
/// assert_eq!(opened.get("ssn"), Some(&serde_json::json!("123")));
/// ```
pub struct AeadProvider {
    key: SecretVec<u8>,
}

impl AeadProvider {
    /// Creates a provider from a 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::EncryptionFailed` if the key is not 32 bytes.
    pub fn new(key: SecretVec<u8>) -> Result<Self, ProviderError> {
        let len = key.expose_secret().len();
        if len != KEY_SIZE {
            return Err(ProviderError::EncryptionFailed(format!(
                "invalid key length: expected {KEY_SIZE}, got {len}"
            )));
        }
        Ok(Self { key })
    }

    /// Creates a provider with a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        Self { key: generate_key() }
    }

    /// Loads a hex-encoded key file.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::EncryptionFailed` if the file cannot be read,
    /// is not hex, or has the wrong length.
    pub fn from_key_file(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let text = Zeroizing::new(fs::read_to_string(path).map_err(|e| {
            ProviderError::EncryptionFailed(format!("cannot read key file {}: {e}", path.display()))
        })?);
        let key = hex::decode(text.trim()).map_err(|e| {
            ProviderError::EncryptionFailed(format!("key file {} is not hex: {e}", path.display()))
        })?;
        Self::new(SecretVec::new(key))
    }

    /// Writes the key as hex to `path`, restricting permissions on Unix.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from writing the file.
    pub fn write_key_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        let encoded = Zeroizing::new(hex::encode(self.key.expose_secret()));
        fs::write(path, encoded.as_bytes())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn cipher(&self) -> Result<ChaCha20Poly1305, ProviderError> {
        ChaCha20Poly1305::new_from_slice(self.key.expose_secret())
            .map_err(|e| ProviderError::EncryptionFailed(format!("invalid key: {e}")))
    }
}

/// Generates a random 32-byte key.
#[must_use]
pub fn generate_key() -> SecretVec<u8> {
    let mut key = vec![0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    SecretVec::new(key)
}

impl EncryptionProvider for AeadProvider {
    fn encrypt(&self, payload: &Map<String, Value>) -> Result<Value, ProviderError> {
        let plaintext = Zeroizing::new(serde_json::to_vec(payload)?);

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher()?
            .encrypt(&Nonce::from(nonce_bytes), plaintext.as_slice())
            .map_err(|e| ProviderError::EncryptionFailed(format!("ChaCha20-Poly1305: {e}")))?;

        let mut blob = Vec::with_capacity(1 + NONCE_SIZE + ciphertext.len());
        blob.push(BLOB_VERSION);
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        Ok(Value::String(STANDARD.encode(blob)))
    }

    fn decrypt(&self, blob: &Value) -> Result<Map<String, Value>, ProviderError> {
        let encoded = blob
            .as_str()
            .ok_or_else(|| ProviderError::InvalidBlob("envelope is not a string".to_string()))?;
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| ProviderError::InvalidBlob(format!("base64: {e}")))?;

        let (&version, rest) = bytes
            .split_first()
            .ok_or_else(|| ProviderError::InvalidBlob("empty envelope".to_string()))?;
        if version != BLOB_VERSION {
            return Err(ProviderError::InvalidBlob(format!(
                "unsupported version: {version} (supported: {BLOB_VERSION})"
            )));
        }
        if rest.len() < NONCE_SIZE {
            return Err(ProviderError::InvalidBlob("envelope too short".to_string()));
        }
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);

        let plaintext = Zeroizing::new(
            self.cipher()?
                .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
                .map_err(|_| {
                    ProviderError::DecryptionFailed(
                        "authentication failed: ciphertext may be corrupted or tampered".into(),
                    )
                })?,
        );

        Ok(serde_json::from_slice(&plaintext)?)
    }

    fn scheme_name(&self) -> &str {
        "chacha20poly1305"
    }
}
