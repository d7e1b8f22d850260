//! Encryption provider abstraction.

use crate::error::ProviderError;
use serde_json::{Map, Value};

/// Opaque encrypt/decrypt capability for record payloads.
///
/// The layer never looks inside the blob; cipher choice, key management and
/// blob format belong to the implementation. Implementations must be
/// thread-safe (`Send + Sync`) since hooks may run from any store task.
///
/// # Example
///
/// ```rust,ignore
/// use veilstore::provider::EncryptionProvider;
///
/// struct MyProvider;
///
/// impl EncryptionProvider for MyProvider {
///     fn encrypt(&self, payload: &Map<String, Value>) -> Result<Value, ProviderError> {
///         // Implementation
///     }
///     // ... other methods
/// }
/// ```
pub trait EncryptionProvider: Send + Sync {
    /// Encrypts the payload fields of a record into a single blob.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::EncryptionFailed` or
    /// `ProviderError::Serialization` if the payload cannot be sealed.
    fn encrypt(&self, payload: &Map<String, Value>) -> Result<Value, ProviderError>;

    /// Recovers the payload fields from a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::DecryptionFailed` if the blob does not
    /// authenticate, or `ProviderError::InvalidBlob` if it is malformed.
    fn decrypt(&self, blob: &Value) -> Result<Map<String, Value>, ProviderError>;

    /// Name of the scheme, for diagnostics.
    fn scheme_name(&self) -> &str {
        "custom"
    }
}
