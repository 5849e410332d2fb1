//! Item records stored in a collection.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{CollectionId, FieldType};

/// Item payload: field name to value. Schema-less at the storage layer.
pub type ItemData = Map<String, Value>;

/// Placeholder rendered for absent or empty values.
pub const EMPTY_VALUE: &str = "—";

/// Opaque item identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Wrap an existing UUID.
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a fresh identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// One record of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    /// Owning collection; never reassigned.
    pub collection_id: CollectionId,
    pub data: ItemData,
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Value stored under `field`, treating JSON `null` as absent.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.data.get(field).filter(|value| !value.is_null())
    }
}

/// Values required to insert an item.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub collection_id: CollectionId,
    pub data: ItemData,
}

/// Plain-text rendering of a stored value, used for search and display.
///
/// Returns `None` for `null`; arrays and objects render as compact JSON.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}

/// Human-facing rendering of a value according to its declared field type.
///
/// # Examples
/// ```
/// use collector::domain::{display_value, FieldType};
/// use serde_json::json;
///
/// assert_eq!(display_value(Some(&json!(true)), FieldType::Boolean), "Yes");
/// assert_eq!(display_value(Some(&json!("")), FieldType::Text), "—");
/// assert_eq!(display_value(None, FieldType::Number), "—");
/// ```
pub fn display_value(value: Option<&Value>, field_type: FieldType) -> String {
    let Some(value) = value else {
        return EMPTY_VALUE.to_owned();
    };
    match (field_type, value) {
        (_, Value::Null) => EMPTY_VALUE.to_owned(),
        (_, Value::String(text)) if text.is_empty() => EMPTY_VALUE.to_owned(),
        (FieldType::Boolean, Value::Bool(true)) => "Yes".to_owned(),
        (FieldType::Boolean, Value::Bool(false)) => "No".to_owned(),
        _ => value_text(value).unwrap_or_else(|| EMPTY_VALUE.to_owned()),
    }
}
