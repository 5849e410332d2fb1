//! Plain-text rendering of snapshots.

use std::fmt::Display;

use crate::domain::{
    COLOR_PALETTE, Collection, ControlKind, FieldControl, Item, Schema, User, display_value,
};

const SHORT_ID_LEN: usize = 8;

/// Leading characters of an id, enough to pick it out in a listing.
pub(crate) fn short_id(id: impl Display) -> String {
    id.to_string().chars().take(SHORT_ID_LEN).collect()
}

pub(crate) fn user_line(user: &User) -> String {
    match &user.email {
        Some(email) => format!("{email} ({})", user.id),
        None => user.id.to_string(),
    }
}

pub(crate) fn color_label(hex: &str) -> &str {
    COLOR_PALETTE
        .iter()
        .find(|(_, candidate)| candidate.eq_ignore_ascii_case(hex))
        .map_or(hex, |(name, _)| name)
}

pub(crate) fn collection_line(collection: &Collection) -> String {
    let star = if collection.is_favorite { " ★" } else { "" };
    let fields = collection.schema.len();
    let plural = if fields == 1 { "" } else { "s" };
    format!(
        "{} {}{star}  [{}]  {fields} field{plural}, {}",
        collection.icon,
        collection.name,
        short_id(collection.id),
        color_label(&collection.color),
    )
}

/// Item summary in schema order; values of removed fields are not shown.
pub(crate) fn item_line(schema: &Schema, item: &Item) -> String {
    let values = schema
        .fields
        .iter()
        .map(|field| {
            let value = display_value(item.value(&field.name), field.field_type);
            format!("{}: {value}", field.name)
        })
        .collect::<Vec<_>>()
        .join(" | ");
    format!("[{}] {values}", short_id(item.id))
}

pub(crate) fn control_line(control: &FieldControl) -> String {
    let (kind, value) = match &control.kind {
        ControlKind::Toggle { value } => ("toggle", if *value { "on" } else { "off" }.to_owned()),
        ControlKind::NumericEntry { value } => ("number", value.clone()),
        ControlKind::DateEntry { value, hint } => ("date", format!("{value} ({hint})")),
        ControlKind::TextEntry { value } => ("text", value.clone()),
    };
    let mut line = format!("{} [{kind}] = {}", control.label, value.trim());
    if let Some(placeholder) = &control.placeholder {
        line.push_str(&format!("  <{placeholder}>"));
    }
    line
}
