//! Reserved names shared by every part of the layer.

/// Field holding the ciphertext blob on stored records.
///
/// Callers must not declare a real field with this name on an encrypted table.
pub const ENVELOPE_FIELD: &str = "__DATA__";

/// Table holding the last written [`Settings`](crate::settings::Settings).
///
/// Callers must not declare a table with this name.
pub const SETTINGS_TABLE: &str = "__ENCRYPTION_SETTINGS__";

/// Store spec of the settings table: one auto-incrementing key, no indexes.
pub const SETTINGS_TABLE_SPEC: &str = "++id";
