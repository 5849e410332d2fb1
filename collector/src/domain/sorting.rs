//! Client-side ordering and search over a snapshot of items.
//!
//! Both functions are pure: they never touch the snapshot they are given and
//! return the same output for the same input.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{FieldType, Item, Schema, value_text};

/// Direction applied to present values. Absent values always sort last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[serde(alias = "asc")]
    Ascending,
    #[default]
    #[serde(alias = "desc")]
    Descending,
}

impl SortOrder {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// Error returned when parsing an unknown sort order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sort order `{0}`; expected asc or desc")]
pub struct UnknownSortOrder(pub String);

impl FromStr for SortOrder {
    type Err = UnknownSortOrder;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            _ => Err(UnknownSortOrder(s.to_owned())),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        })
    }
}

/// What items are ordered by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "mode", content = "field")]
pub enum SortMode {
    /// Item creation time.
    #[default]
    CreatedAt,
    /// A named data field, compared by its declared type.
    Field(String),
}

/// Active sort configuration. Defaults to newest first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SortSettings {
    pub mode: SortMode,
    pub order: SortOrder,
}

impl SortSettings {
    /// Sort by creation time.
    pub fn created_at(order: SortOrder) -> Self {
        Self {
            mode: SortMode::CreatedAt,
            order,
        }
    }

    /// Sort by a named field.
    pub fn by_field(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            mode: SortMode::Field(field.into()),
            order,
        }
    }
}

/// Comparable projection of a stored value.
///
/// Values that fail to parse as their declared type fall back to `Text`,
/// which ranks after every typed key so the ordering stays total.
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Number(f64),
    Instant(i64),
    Flag(bool),
    Text { folded: String, raw: String },
}

impl SortKey {
    fn text(raw: String) -> Self {
        Self::Text {
            folded: raw.to_lowercase(),
            raw,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Instant(_) => 1,
            Self::Flag(_) => 2,
            Self::Text { .. } => 3,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Instant(a), Self::Instant(b)) => a.cmp(b),
            (Self::Flag(a), Self::Flag(b)) => a.cmp(b),
            (
                Self::Text {
                    folded: a_folded,
                    raw: a_raw,
                },
                Self::Text {
                    folded: b_folded,
                    raw: b_raw,
                },
            ) => a_folded.cmp(b_folded).then_with(|| a_raw.cmp(b_raw)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

fn parse_instant(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc().timestamp_millis());
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|instant| instant.timestamp_millis())
}

fn sort_key(value: &Value, field_type: FieldType) -> Option<SortKey> {
    let typed = match (field_type, value) {
        (_, Value::Null) => return None,
        (FieldType::Number, Value::Number(number)) => number.as_f64().map(SortKey::Number),
        (FieldType::Number, Value::String(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .map(SortKey::Number),
        (FieldType::Date, Value::String(text)) => parse_instant(text).map(SortKey::Instant),
        (FieldType::Boolean, Value::Bool(flag)) => Some(SortKey::Flag(*flag)),
        _ => None,
    };
    typed.or_else(|| value_text(value).map(SortKey::text))
}

fn compare_optional(a: Option<&SortKey>, b: Option<&SortKey>, order: SortOrder) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => order.apply(a.compare(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Return `items` ordered by `settings`.
///
/// The sort is stable, so ties keep their snapshot order. In field mode the
/// field's declared type in `schema` picks the comparison; fields the schema
/// does not know are compared as text.
pub fn sort_items(items: &[Item], schema: Option<&Schema>, settings: &SortSettings) -> Vec<Item> {
    let mut sorted = items.to_vec();
    match &settings.mode {
        SortMode::CreatedAt => {
            sorted.sort_by(|a, b| settings.order.apply(a.created_at.cmp(&b.created_at)));
        }
        SortMode::Field(field) => {
            let field_type = schema
                .and_then(|schema| schema.field_type(field))
                .unwrap_or(FieldType::Text);
            let mut keyed: Vec<(Option<SortKey>, Item)> = sorted
                .into_iter()
                .map(|item| {
                    let key = item
                        .data
                        .get(field)
                        .and_then(|value| sort_key(value, field_type));
                    (key, item)
                })
                .collect();
            keyed.sort_by(|(a, _), (b, _)| compare_optional(a.as_ref(), b.as_ref(), settings.order));
            sorted = keyed.into_iter().map(|(_, item)| item).collect();
        }
    }
    sorted
}

/// Keep items where any data value contains `query`, ignoring case.
///
/// A blank query keeps everything.
pub fn filter_items(items: &[Item], query: &str) -> Vec<Item> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return items.to_vec();
    }
    items
        .iter()
        .filter(|item| {
            item.data
                .values()
                .filter_map(value_text)
                .any(|text| text.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    //! Regression coverage for item ordering and search.

    use super::*;
    use crate::domain::{CollectionId, Field, ItemId};
    use chrono::{TimeDelta, TimeZone, Utc};
    use rstest::{fixture, rstest};
    use serde_json::json;

    fn item(label: &str, minutes: i64, data: Value) -> Item {
        let Value::Object(mut data) = data else {
            panic!("fixture data must be an object");
        };
        data.insert("Label".to_owned(), json!(label));
        Item {
            id: ItemId::random(),
            collection_id: CollectionId::random(),
            data,
            created_at: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .expect("valid timestamp")
                + TimeDelta::minutes(minutes),
        }
    }

    fn labels(items: &[Item]) -> Vec<String> {
        items
            .iter()
            .map(|item| item.data["Label"].as_str().unwrap_or_default().to_owned())
            .collect()
    }

    #[fixture]
    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("Name", FieldType::Text, false),
            Field::new("Qty", FieldType::Number, false),
            Field::new("Due", FieldType::Date, false),
            Field::new("Done", FieldType::Boolean, false),
        ])
    }

    #[fixture]
    fn items() -> Vec<Item> {
        vec![
            item("a", 3, json!({ "Name": "banana", "Qty": 10, "Due": "2024-03-01", "Done": true })),
            item("b", 1, json!({ "Name": "Apple", "Qty": 2, "Due": "2023-12-31", "Done": false })),
            item("c", 4, json!({ "Qty": null })),
            item("d", 2, json!({ "Name": "cherry", "Qty": 9.5, "Due": "2024-01-15", "Done": false })),
        ]
    }

    #[rstest]
    #[case::created_desc(SortSettings::default(), ["c", "a", "d", "b"])]
    #[case::created_asc(SortSettings::created_at(SortOrder::Ascending), ["b", "d", "a", "c"])]
    #[case::number_asc(SortSettings::by_field("Qty", SortOrder::Ascending), ["b", "d", "a", "c"])]
    #[case::number_desc(SortSettings::by_field("Qty", SortOrder::Descending), ["a", "d", "b", "c"])]
    #[case::date_asc(SortSettings::by_field("Due", SortOrder::Ascending), ["b", "d", "a", "c"])]
    #[case::text_asc(SortSettings::by_field("Name", SortOrder::Ascending), ["b", "a", "d", "c"])]
    #[case::text_desc(SortSettings::by_field("Name", SortOrder::Descending), ["d", "a", "b", "c"])]
    #[case::flag_desc(SortSettings::by_field("Done", SortOrder::Descending), ["a", "b", "d", "c"])]
    fn orders_by_declared_type(
        schema: Schema,
        items: Vec<Item>,
        #[case] settings: SortSettings,
        #[case] expected: [&str; 4],
    ) {
        let sorted = sort_items(&items, Some(&schema), &settings);
        assert_eq!(labels(&sorted), expected);
    }

    #[rstest]
    #[case(SortOrder::Ascending)]
    #[case(SortOrder::Descending)]
    fn missing_values_sort_last_in_both_directions(
        schema: Schema,
        items: Vec<Item>,
        #[case] order: SortOrder,
    ) {
        let sorted = sort_items(&items, Some(&schema), &SortSettings::by_field("Due", order));
        assert_eq!(labels(&sorted).last().map(String::as_str), Some("c"));
    }

    #[rstest]
    fn sorting_is_idempotent_and_leaves_input_untouched(schema: Schema, items: Vec<Item>) {
        let settings = SortSettings::by_field("Name", SortOrder::Descending);
        let first = sort_items(&items, Some(&schema), &settings);
        let second = sort_items(&items, Some(&schema), &settings);
        assert_eq!(first, second);
        assert_eq!(labels(&items), ["a", "b", "c", "d"]);
        assert_eq!(sort_items(&first, Some(&schema), &settings), first);
    }

    #[rstest]
    fn ties_keep_snapshot_order(schema: Schema) {
        let items = vec![
            item("x", 0, json!({ "Done": true })),
            item("y", 1, json!({ "Done": true })),
            item("z", 2, json!({ "Done": true })),
        ];
        let sorted = sort_items(&items, Some(&schema), &SortSettings::by_field("Done", SortOrder::Ascending));
        assert_eq!(labels(&sorted), ["x", "y", "z"]);
    }

    #[rstest]
    fn unparsable_typed_values_follow_parsed_ones(schema: Schema) {
        let items = vec![
            item("text", 0, json!({ "Qty": "lots" })),
            item("num", 1, json!({ "Qty": "7" })),
            item("none", 2, json!({})),
        ];
        let sorted = sort_items(&items, Some(&schema), &SortSettings::by_field("Qty", SortOrder::Ascending));
        assert_eq!(labels(&sorted), ["num", "text", "none"]);
    }

    #[rstest]
    fn unknown_fields_compare_as_text(items: Vec<Item>) {
        let sorted = sort_items(&items, None, &SortSettings::by_field("Name", SortOrder::Ascending));
        assert_eq!(labels(&sorted), ["b", "a", "d", "c"]);
    }

    #[rstest]
    #[case("", 4)]
    #[case("APP", 1)]
    #[case("an", 1)]
    #[case("9.5", 1)]
    #[case("false", 2)]
    #[case("kiwi", 0)]
    fn search_matches_any_value_ignoring_case(
        items: Vec<Item>,
        #[case] query: &str,
        #[case] expected: usize,
    ) {
        assert_eq!(filter_items(&items, query).len(), expected);
    }

    #[rstest]
    fn sort_order_parses_short_and_long_names() {
        assert_eq!("ASC".parse::<SortOrder>(), Ok(SortOrder::Ascending));
        assert_eq!("descending".parse::<SortOrder>(), Ok(SortOrder::Descending));
        assert!("sideways".parse::<SortOrder>().is_err());
    }
}
