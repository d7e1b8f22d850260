//! # `Veilstore`
//!
//! Transparent field-level encryption for versioned, schema-based record
//! stores.
//!
//! Selected tables get create/update/read hooks that move every payload field
//! (anything that is neither the primary key nor a secondary index) into a
//! single encrypted envelope field. Key and index fields stay in plaintext so
//! lookups and range queries keep working.
//!
//! ## Features
//!
//! - Envelope encryption of payload fields with a pluggable provider
//! - Partial updates that always re-encrypt the full payload
//! - Passthrough of records written before encryption was enabled
//! - Tracking of encrypted tables across schema-version upgrades
//!
//! ## Example
//!
//! ```rust,ignore
//! use veilstore::prelude::*;
//!
//! let store = MemoryStore::new();
//! store.declare(1, &[("users", "++id, email")])?;
//!
//! let config = EncryptionConfig::new(provider).with_table("users");
//! let session = veilstore::install(&store, config)?;
//!
//! store.open().await?;
//! assert!(session.is_ready());
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;
pub mod hooks;
pub mod memory;
pub mod migration;
pub mod provider;
pub mod record;
pub mod scenario;
pub mod schema;
pub mod session;
pub mod settings;
pub mod store;
pub mod transform;

#[cfg(test)]
mod test_support;

pub use session::install;

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::config::EncryptionConfig;
    pub use crate::error::{Error, ProviderError, StoreError};
    pub use crate::memory::MemoryStore;
    pub use crate::provider::EncryptionProvider;
    pub use crate::record::{Field, Record};
    pub use crate::scenario::Scenario;
    pub use crate::schema::{StoreSpec, TableSchema};
    pub use crate::session::{install, Readiness, Session};
    pub use crate::store::{Store, TableHooks};
}
