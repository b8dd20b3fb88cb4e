//! Store items and their identities.
//!
//! An [`Item`] is an opaque record owned by the backing store. The model only
//! ever holds copies of items; it never treats them as authoritative.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// The identity of a store item: a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    /// Integer identity.
    Num(i64),
    /// String identity.
    Str(String),
}

impl ItemId {
    /// Converts a JSON value into an identity.
    ///
    /// Strings and integral numbers map directly. Numbers that do not fit an
    /// `i64` (or are not integral) map to their string form. Every other JSON
    /// kind has no identity.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(ItemId::Str(s.clone())),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => ItemId::Num(i),
                None => ItemId::Str(n.to_string()),
            }),
            _ => None,
        }
    }

    /// Converts this identity back into a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            ItemId::Num(n) => Value::Number(Number::from(*n)),
            ItemId::Str(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Num(n) => write!(f, "{n}"),
            ItemId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ItemId {
    fn from(value: i64) -> Self {
        ItemId::Num(value)
    }
}

impl From<i32> for ItemId {
    fn from(value: i32) -> Self {
        ItemId::Num(value.into())
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        ItemId::Str(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        ItemId::Str(value)
    }
}

/// A record from the backing store.
///
/// Fields are kept as JSON values. Equality is field-for-field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(Map<String, Value>);

impl Item {
    /// Creates an item with no fields.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Creates an item from a JSON value. Returns `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Returns a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Sets a field, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Returns `true` if the field is present (even when `null`).
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Iterates over all fields.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the item has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reads the identity stored under `id_property`.
    pub fn identity(&self, id_property: &str) -> Option<ItemId> {
        self.get(id_property).and_then(ItemId::from_value)
    }

    /// Returns a field as a string slice, if it is a string.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Converts the item into a JSON object value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Item {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Item {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
