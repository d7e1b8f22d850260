//! The create/update/read hook triple installed on encrypted tables.

use crate::error::Error;
use crate::provider::EncryptionProvider;
use crate::record::Record;
use crate::schema::TableSchema;
use crate::store::TableHooks;
use crate::transform::{self, Removal};
use std::sync::Arc;

/// Hooks wiring one table to the record transformer.
pub struct EncryptionHooks {
    schema: TableSchema,
    provider: Arc<dyn EncryptionProvider>,
}

impl EncryptionHooks {
    /// Creates hooks for `schema`, sealing payloads with `provider`.
    #[must_use]
    pub fn new(schema: TableSchema, provider: Arc<dyn EncryptionProvider>) -> Self {
        Self { schema, provider }
    }

    /// Returns the schema the hooks were built for.
    #[must_use]
    pub const fn schema(&self) -> &TableSchema {
        &self.schema
    }
}

impl TableHooks for EncryptionHooks {
    fn creating(&self, record: &mut Record) -> Result<(), Error> {
        transform::encode(&self.schema, record, self.provider.as_ref(), Removal::Delete)
    }

    fn updating(&self, modifications: &Record, stored: &Record) -> Result<Option<Record>, Error> {
        transform::update(&self.schema, modifications, stored, self.provider.as_ref())
    }

    fn reading(&self, record: Record) -> Result<Record, Error> {
        transform::decode(record, self.provider.as_ref(), Removal::Delete)
    }
}
