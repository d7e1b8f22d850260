//! Record transformation: encrypt on write, decrypt on read, merge on update.
//!
//! Stored records of an encrypted table carry only their primary key, their
//! index fields and the [`ENVELOPE_FIELD`]. Every other field lives inside
//! the envelope blob.

use crate::constants::ENVELOPE_FIELD;
use crate::error::Error;
use crate::provider::EncryptionProvider;
use crate::record::Record;
use crate::schema::TableSchema;
use serde_json::{Map, Value};
use tracing::trace;

/// How a field is taken out of a record.
///
/// Full writes and partial-update instructions remove fields differently in
/// the host store: a full write simply lacks the key, an update instruction
/// must carry an explicit [`Field::Absent`](crate::record::Field::Absent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Delete the slot (create path, full records).
    Delete,
    /// Replace the slot with an `Absent` marker (update instructions).
    MarkAbsent,
}

impl Removal {
    fn apply(self, record: &mut Record, field: &str) {
        match self {
            Self::Delete => {
                record.remove(field);
            }
            Self::MarkAbsent => record.mark_absent(field),
        }
    }
}

/// Encrypts the payload fields of `record` in place.
///
/// Every present field that is neither the primary key nor an index is copied
/// into a snapshot, sealed by `provider` and stored under the envelope field.
/// The payload fields are then removed from `record` according to `removal`.
/// Afterwards `record` holds the key fields, the envelope and, for
/// [`Removal::MarkAbsent`], `Absent` markers.
///
/// # Errors
///
/// Provider failures are returned unchanged as [`Error::Provider`]; `record`
/// is left untouched in that case.
pub fn encode(
    schema: &TableSchema,
    record: &mut Record,
    provider: &dyn EncryptionProvider,
    removal: Removal,
) -> Result<(), Error> {
    let payload_fields: Vec<String> = record
        .keys()
        .filter(|name| *name != ENVELOPE_FIELD && !schema.is_key_field(name))
        .map(str::to_string)
        .collect();

    let snapshot: Map<String, Value> = payload_fields
        .iter()
        .filter_map(|name| record.get(name).map(|value| (name.clone(), value.clone())))
        .collect();

    let blob = provider.encrypt(&snapshot)?;
    trace!(table = schema.name(), fields = snapshot.len(), "payload sealed");

    for name in &payload_fields {
        removal.apply(record, name);
    }
    record.insert(ENVELOPE_FIELD, blob);
    Ok(())
}

/// Decrypts a stored record.
///
/// Records without a (non-null) envelope are returned unchanged. Otherwise the
/// envelope is opened, its fields are merged under the record's own fields
/// (stored key and index fields win on a collision) and the envelope slot is
/// removed according to `removal`.
///
/// # Errors
///
/// Provider failures are returned unchanged as [`Error::Provider`].
pub fn decode(
    record: Record,
    provider: &dyn EncryptionProvider,
    removal: Removal,
) -> Result<Record, Error> {
    let Some(blob) = record.get(ENVELOPE_FIELD).filter(|blob| !blob.is_null()) else {
        return Ok(record);
    };

    let mut decoded = Record::from_object(provider.decrypt(blob)?);
    decoded.overlay(&record);
    removal.apply(&mut decoded, ENVELOPE_FIELD);
    Ok(decoded)
}

/// Computes the update instruction for a partial modification of a stored record.
///
/// Returns `None` when `modifications` touches nothing but the envelope field.
/// Otherwise the stored record is decrypted, the modifications are overlaid on
/// the full plaintext, and the result is encoded with [`Removal::MarkAbsent`],
/// so the envelope always seals the complete current payload.
///
/// # Errors
///
/// Provider failures are returned unchanged as [`Error::Provider`].
pub fn update(
    schema: &TableSchema,
    modifications: &Record,
    stored: &Record,
    provider: &dyn EncryptionProvider,
) -> Result<Option<Record>, Error> {
    if modifications.keys().all(|name| name == ENVELOPE_FIELD) {
        return Ok(None);
    }

    let mut merged = decode(stored.clone(), provider, Removal::Delete)?;
    merged.overlay(modifications);
    merged.remove(ENVELOPE_FIELD);

    encode(schema, &mut merged, provider, Removal::MarkAbsent)?;
    Ok(Some(merged))
}
