//! Table schema descriptors and the settings-table schema extension.

use crate::constants::{SETTINGS_TABLE, SETTINGS_TABLE_SPEC};
use crate::error::StoreError;
use std::collections::BTreeMap;

/// Primary key of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    name: String,
    auto_increment: bool,
}

impl PrimaryKey {
    /// Creates a primary key descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, auto_increment: bool) -> Self {
        Self { name: name.into(), auto_increment }
    }

    /// Returns the key field name. Empty for outbound keys.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the store generates keys for this table.
    #[must_use]
    pub const fn auto_increment(&self) -> bool {
        self.auto_increment
    }
}

/// Schema of one table: its primary key and ordered secondary indexes.
///
/// Owned by the store; read-only to the encryption layer.
///
/// # Example
///
/// ```
/// use veilstore::schema::TableSchema;
///
/// let schema = TableSchema::parse("users", "++id, &email, *tags").unwrap();
/// assert_eq!(schema.primary_key().name(), "id");
/// assert!(schema.is_key_field("email"));
/// assert!(!schema.is_key_field("ssn"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    primary_key: PrimaryKey,
    indexes: Vec<String>,
}

impl TableSchema {
    /// Creates a schema from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, primary_key: PrimaryKey, indexes: Vec<String>) -> Self {
        Self { name: name.into(), primary_key, indexes }
    }

    /// Parses a compact store spec such as `"++id, email, [first+last]"`.
    ///
    /// The first entry is the primary key (`++` marks auto increment, an empty
    /// entry an outbound key). The remaining entries are secondary indexes;
    /// `&` (unique) and `*` (multi-entry) prefixes are stripped.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Schema` if a field is declared twice.
    pub fn parse(name: impl Into<String>, spec: &str) -> Result<Self, StoreError> {
        let name = name.into();
        let mut entries = spec.split(',').map(str::trim);

        // `split` always yields at least one entry
        let first = entries.next().unwrap_or_default();
        let primary_key = first.strip_prefix("++").map_or_else(
            || PrimaryKey::new(strip_modifiers(first), false),
            |key| PrimaryKey::new(strip_modifiers(key), true),
        );

        let mut indexes: Vec<String> = Vec::new();
        for entry in entries.filter(|entry| !entry.is_empty()) {
            let index = strip_modifiers(entry);
            if index == primary_key.name || indexes.iter().any(|seen| seen == index) {
                return Err(StoreError::Schema(format!(
                    "field {index} declared twice on table {name}"
                )));
            }
            indexes.push(index.to_string());
        }

        Ok(Self { name, primary_key, indexes })
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the primary key descriptor.
    #[must_use]
    pub const fn primary_key(&self) -> &PrimaryKey {
        &self.primary_key
    }

    /// Returns the secondary index field names, in declaration order.
    #[must_use]
    pub fn indexes(&self) -> &[String] {
        &self.indexes
    }

    /// Returns `true` for the primary key, every secondary index field and
    /// every member of a compound index. These fields are never encrypted.
    #[must_use]
    pub fn is_key_field(&self, field: &str) -> bool {
        (!self.primary_key.name.is_empty() && self.primary_key.name == field)
            || self.indexes.iter().any(|index| {
                index == field || compound_members(index).any(|member| member == field)
            })
    }
}

// Members of a `[a+b]` index; empty for plain indexes.
fn compound_members(index: &str) -> impl Iterator<Item = &str> {
    index
        .strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .into_iter()
        .flat_map(|inner| inner.split('+').map(str::trim))
        .filter(|member| !member.is_empty())
}

fn strip_modifiers(entry: &str) -> &str {
    entry.trim_start_matches(['&', '*'])
}

/// Table specs declared for one schema version, before the store parses them.
pub type StoreSpec = BTreeMap<String, String>;

/// Hook into the store's schema-declaration step.
///
/// The store calls every registered extension on each version declaration,
/// before parsing and committing the declared specs.
pub trait SchemaExtension: Send + Sync {
    /// Adjusts the declared specs in place.
    fn extend(&self, stores: &mut StoreSpec);
}

/// Declares the reserved settings table with a single auto-incrementing key.
///
/// Tables the caller already declared are left untouched, so applying the
/// extension several times yields the same spec.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsTableExtension;

impl SchemaExtension for SettingsTableExtension {
    fn extend(&self, stores: &mut StoreSpec) {
        stores.entry(SETTINGS_TABLE.to_string()).or_insert_with(|| SETTINGS_TABLE_SPEC.to_string());
    }
}
