//! Interface of the underlying record store.
//!
//! The store engine is an external collaborator. This module only describes
//! what the encryption layer needs from it: schema introspection and
//! extension, per-table hook registration, a ready lifecycle event, and basic
//! CRUD on the settings table.

use crate::error::{Error, StoreError};
use crate::record::Record;
use crate::schema::{SchemaExtension, TableSchema};
use async_trait::async_trait;
use std::sync::Arc;

/// Per-table interceptors for create, update and read events.
pub trait TableHooks: Send + Sync {
    /// Called with the full record before it is written. The hook may rewrite
    /// the record in place.
    ///
    /// # Errors
    ///
    /// An error aborts the write.
    fn creating(&self, record: &mut Record) -> Result<(), Error>;

    /// Called with a partial modification set and the stored record it applies
    /// to. Returning `Some(instruction)` replaces the modification set;
    /// `None` keeps it unchanged.
    ///
    /// # Errors
    ///
    /// An error aborts the update.
    fn updating(&self, modifications: &Record, stored: &Record) -> Result<Option<Record>, Error>;

    /// Called with every stored record on its way to the caller.
    ///
    /// # Errors
    ///
    /// An error aborts the read.
    fn reading(&self, record: Record) -> Result<Record, Error>;
}

/// Listener for the store's ready lifecycle event.
///
/// The store awaits each handler once per open, after schema negotiation and
/// before callers may use it. An error rejects the open.
#[async_trait]
pub trait ReadyHandler: Send + Sync {
    /// Runs the ready step against the store that just opened.
    async fn on_ready(&self, store: &dyn Store) -> Result<(), Error>;
}

/// Store collaborator capability.
#[async_trait]
pub trait Store: Send + Sync {
    /// Highest schema version declared so far; `0` before any declaration.
    fn version(&self) -> u32;

    /// Registers an extension applied to every subsequent version declaration.
    fn extend_schema(&self, extension: Arc<dyn SchemaExtension>);

    /// Re-declares the current version with no additional tables so that
    /// registered extensions take effect.
    ///
    /// # Errors
    ///
    /// Fails if the store no longer accepts schema changes.
    fn touch_schema(&self) -> Result<(), StoreError>;

    /// Every table currently declared on the store.
    fn tables(&self) -> Vec<TableSchema>;

    /// Looks up a table by name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the table is not declared.
    fn table(&self, name: &str) -> Result<TableSchema, StoreError>;

    /// Attaches the hook triple to a table.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the table is not declared.
    fn install_hooks(&self, table: &str, hooks: Arc<dyn TableHooks>) -> Result<(), StoreError>;

    /// Subscribes to the ready lifecycle event.
    fn on_ready(&self, handler: Arc<dyn ReadyHandler>);

    /// Most recently inserted record of a table.
    async fn last(&self, table: &str) -> Result<Option<Record>, StoreError>;

    /// Deletes every record of a table.
    async fn clear(&self, table: &str) -> Result<(), StoreError>;

    /// Inserts a record without running hooks.
    async fn put(&self, table: &str, record: Record) -> Result<(), StoreError>;
}
