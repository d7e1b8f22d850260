//! The persisted snapshot of which tables are configured for encryption.

use crate::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field of the settings record holding the table list.
const TABLES_FIELD: &str = "tables";

/// Last written encryption settings: `{ tables: [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Names of the tables configured for encryption, in configuration order.
    #[serde(default)]
    pub tables: Vec<String>,
}

impl Settings {
    /// Creates settings for the given tables.
    #[must_use]
    pub fn new(tables: Vec<String>) -> Self {
        Self { tables }
    }

    /// Reads settings from a stored record.
    ///
    /// A missing or non-array `tables` field yields an empty table list;
    /// non-string entries are skipped.
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        let tables = match record.get(TABLES_FIELD) {
            Some(Value::Array(items)) => {
                items.iter().filter_map(Value::as_str).map(str::to_string).collect()
            }
            _ => Vec::new(),
        };
        Self { tables }
    }

    /// Builds the record written to the settings table.
    #[must_use]
    pub fn to_record(&self) -> Record {
        let tables = self.tables.iter().cloned().map(Value::String).collect();
        std::iter::once((TABLES_FIELD, Value::Array(tables))).collect()
    }
}
