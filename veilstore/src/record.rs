//! Entity records as seen by hooks and the store collaborator.
//!
//! A [`Record`] is an ordered mapping from field name to [`Field`]. The
//! [`Field::Absent`] marker is how a partial-update instruction says "drop
//! this key"; a full write never carries it (the field is simply removed).

use serde_json::{Map, Value};
use std::collections::btree_map::{self, BTreeMap};

/// A single field slot of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// The field holds a value.
    Present(Value),
    /// The field must be dropped from the target record.
    Absent,
}

impl Field {
    /// Returns the value, if present.
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent => None,
        }
    }

    /// Returns `true` for [`Field::Present`].
    #[must_use]
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Self::Present(value)
    }
}

/// Ordered field-name to field mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Field>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from a JSON object, every field present.
    #[must_use]
    pub fn from_object(object: Map<String, Value>) -> Self {
        object.into_iter().collect()
    }

    /// Returns the present fields as a JSON object.
    #[must_use]
    pub fn to_object(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter_map(|(name, field)| field.value().map(|v| (name.clone(), v.clone())))
            .collect()
    }

    /// Returns the value of a present field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).and_then(Field::value)
    }

    /// Returns the raw slot of a field, including `Absent` markers.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Sets a field to a present value, returning the previous slot.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Field> {
        self.fields.insert(name.into(), Field::Present(value.into()))
    }

    /// Replaces the slot of a field with an `Absent` marker.
    pub fn mark_absent(&mut self, name: impl Into<String>) {
        self.fields.insert(name.into(), Field::Absent);
    }

    /// Removes a field slot entirely.
    pub fn remove(&mut self, name: &str) -> Option<Field> {
        self.fields.remove(name)
    }

    /// Returns `true` if the record has a slot for `name`, present or absent.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Returns `true` if `name` holds a non-null value.
    #[must_use]
    pub fn is_present(&self, name: &str) -> bool {
        self.get(name).is_some_and(|value| !value.is_null())
    }

    /// Iterates over every slot in field-name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Field> {
        self.fields.iter()
    }

    /// Field names in order, including `Absent` slots.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the record has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Overlays `other` onto `self` slot by slot. On a name collision the slot
    /// from `other` wins, `Absent` markers included.
    pub fn overlay(&mut self, other: &Self) {
        for (name, field) in &other.fields {
            self.fields.insert(name.clone(), field.clone());
        }
    }

    /// Applies a partial-update instruction: present slots are written,
    /// `Absent` slots delete the field.
    pub fn apply(&mut self, instruction: &Self) {
        for (name, field) in &instruction.fields {
            match field {
                Field::Present(value) => {
                    self.fields.insert(name.clone(), Field::Present(value.clone()));
                }
                Field::Absent => {
                    self.fields.remove(name);
                }
            }
        }
    }

    /// Drops every `Absent` slot, turning an instruction into a full record.
    pub fn compact(&mut self) {
        self.fields.retain(|_, field| field.is_present());
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self { fields: iter.into_iter().map(|(name, value)| (name, Field::Present(value))).collect() }
    }
}

impl<'a> FromIterator<(&'a str, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (&'a str, Value)>>(iter: I) -> Self {
        iter.into_iter().map(|(name, value)| (name.to_string(), value)).collect()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(object: Map<String, Value>) -> Self {
        Self::from_object(object)
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Field);
    type IntoIter = btree_map::Iter<'a, String, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
