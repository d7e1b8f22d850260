//! Classification of a table's encryption-status transition.
//!
//! Classification is pure: it only looks at the table name and the two table
//! sets, so it can be planned for every table before any hook is attached.

use crate::constants::SETTINGS_TABLE;
use crate::schema::TableSchema;
use std::fmt;

/// Transition of one table between the previous and the desired configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// The table is the reserved settings table.
    IsSettingsTable,
    /// Not encrypted before, not encrypted now.
    UnencryptedNoChange,
    /// Not encrypted before, encrypted now.
    UnencryptedChange,
    /// Encrypted before, not encrypted now. Stored ciphertext is left as is.
    EncryptedChange,
    /// Encrypted before and still encrypted.
    EncryptedNoChange,
}

impl Scenario {
    /// Returns `true` if the table gets the create/update/read hook triple
    /// in this lifecycle run.
    #[must_use]
    pub const fn requires_hooks(self) -> bool {
        matches!(self, Self::UnencryptedChange | Self::EncryptedNoChange)
    }

    /// Short machine-friendly name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IsSettingsTable => "is-settings-table",
            Self::UnencryptedNoChange => "unencrypted-no-change",
            Self::UnencryptedChange => "unencrypted-change",
            Self::EncryptedChange => "encrypted-change",
            Self::EncryptedNoChange => "encrypted-no-change",
        }
    }

    /// Human readable description of the transition.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::IsSettingsTable => "Table is encryption settings table",
            Self::UnencryptedNoChange => "Table was previously not encrypted and still isn't",
            Self::UnencryptedChange => "Table was previously not encrypted but now is",
            Self::EncryptedChange => "Table was previously encrypted but now is not",
            Self::EncryptedNoChange => "Table was previously encrypted and still is",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies `table` against the desired and previously recorded table sets.
///
/// The settings table check comes first; the remaining four scenarios are
/// decided by membership in `previous` and `desired`.
///
/// # Example
///
/// ```
/// use veilstore::scenario::{classify, Scenario};
///
/// let desired = ["users"];
/// let previous: [&str; 0] = [];
/// assert_eq!(classify("users", &desired, &previous), Scenario::UnencryptedChange);
/// assert_eq!(classify("users", &previous, &desired), Scenario::EncryptedChange);
/// ```
#[must_use]
pub fn classify<D, P>(table: &str, desired: &[D], previous: &[P]) -> Scenario
where
    D: AsRef<str>,
    P: AsRef<str>,
{
    if table == SETTINGS_TABLE {
        return Scenario::IsSettingsTable;
    }

    let was_encrypted = previous.iter().any(|name| name.as_ref() == table);
    let is_encrypted = desired.iter().any(|name| name.as_ref() == table);

    match (was_encrypted, is_encrypted) {
        (false, false) => Scenario::UnencryptedNoChange,
        (false, true) => Scenario::UnencryptedChange,
        (true, false) => Scenario::EncryptedChange,
        (true, true) => Scenario::EncryptedNoChange,
    }
}

/// Classifies every table, preserving the order of `tables`.
#[must_use]
pub fn plan<'a, D, P>(
    tables: &'a [TableSchema],
    desired: &[D],
    previous: &[P],
) -> Vec<(&'a TableSchema, Scenario)>
where
    D: AsRef<str>,
    P: AsRef<str>,
{
    tables.iter().map(|table| (table, classify(table.name(), desired, previous))).collect()
}
