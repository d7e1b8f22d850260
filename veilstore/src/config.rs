//! Caller configuration of the encryption layer.

use crate::provider::EncryptionProvider;
use std::fmt;
use std::sync::Arc;

/// Which tables to encrypt, and with which provider.
///
/// # Example
///
/// ```rust,ignore
/// use veilstore::config::EncryptionConfig;
///
/// let config = EncryptionConfig::new(Arc::new(provider))
///     .with_table("users")
///     .with_tables(["payments", "notes"]);
/// ```
#[derive(Clone, Default)]
pub struct EncryptionConfig {
    provider: Option<Arc<dyn EncryptionProvider>>,
    tables: Vec<String>,
}

impl EncryptionConfig {
    /// Creates a configuration sealing payloads with `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn EncryptionProvider>) -> Self {
        Self { provider: Some(provider), tables: Vec::new() }
    }

    /// Creates a configuration without a provider. Only valid with no tables,
    /// for example to record that encryption was switched off.
    #[must_use]
    pub fn unencrypted() -> Self {
        Self::default()
    }

    /// Adds a table to encrypt. Duplicates are ignored.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        let table = table.into();
        if !self.tables.contains(&table) {
            self.tables.push(table);
        }
        self
    }

    /// Adds several tables to encrypt, keeping their order.
    #[must_use]
    pub fn with_tables<I, T>(self, tables: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        tables.into_iter().fold(self, |config, table| config.with_table(table))
    }

    /// Returns the tables to encrypt, in configuration order.
    #[must_use]
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    /// Returns the encryption provider, if any.
    #[must_use]
    pub fn provider(&self) -> Option<&Arc<dyn EncryptionProvider>> {
        self.provider.as_ref()
    }
}

impl fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("provider", &self.provider.as_ref().map(|p| p.scheme_name().to_string()))
            .field("tables", &self.tables)
            .finish()
    }
}
