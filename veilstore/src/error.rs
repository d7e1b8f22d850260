//! Error types for `Veilstore` operations.

use std::fmt;

/// Main error type for `Veilstore` operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The layer was configured on a store that is already past version 0 and
    /// its schema could not be touched up to add the settings table.
    #[error("veilstore: The middleware cannot be installed on an open database")]
    StoreAlreadyOpen,

    /// The settings table is missing at ready time.
    #[error("veilstore: Can't find encryption table. You may need to bump the db version")]
    EncryptionTableNotFound,

    /// Tables were selected for encryption but no provider was supplied.
    #[error("veilstore: tables {0:?} are configured for encryption but no provider was given")]
    MissingProvider(Vec<String>),

    /// Encryption provider failure, passed through unchanged.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Store collaborator failure other than a missing settings table.
    #[error("veilstore: store error: {0}")]
    Store(#[from] StoreError),
}

impl Error {
    /// Maps a store failure raised during the ready-time migration.
    ///
    /// Not-found conditions become [`Error::EncryptionTableNotFound`], everything
    /// else is kept as is.
    #[must_use]
    pub fn from_settings_io(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::EncryptionTableNotFound,
            other => Self::Store(other),
        }
    }
}

/// Errors reported by the store collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Table or record does not exist
    NotFound(String),

    /// Schema declaration was rejected
    Schema(String),

    /// A write or lookup was attempted while the store is closed
    NotOpen,

    /// A record violates a constraint of the store (missing key, duplicate key)
    Constraint(String),

    /// Backend specific failure
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::Schema(msg) => write!(f, "schema error: {msg}"),
            Self::NotOpen => write!(f, "store is not open"),
            Self::Constraint(msg) => write!(f, "constraint violated: {msg}"),
            Self::Backend(msg) => write!(f, "backend error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors reported by an encryption provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Encryption operation failed
    EncryptionFailed(String),

    /// Decryption operation failed (wrong key, tampered blob)
    DecryptionFailed(String),

    /// The envelope value is not a blob this provider produced
    InvalidBlob(String),

    /// Payload could not be (de)serialized
    Serialization(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncryptionFailed(msg) => write!(f, "encryption failed: {msg}"),
            Self::DecryptionFailed(msg) => write!(f, "decryption failed: {msg}"),
            Self::InvalidBlob(msg) => write!(f, "invalid envelope blob: {msg}"),
            Self::Serialization(msg) => write!(f, "payload serialization failed: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
