//! Collection records (user-defined, schema-typed lists).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Schema, UserId};

/// Colour assigned to new collections when none is chosen.
pub const DEFAULT_COLOR: &str = "#3b82f6";
/// Icon assigned to new collections when none is chosen.
pub const DEFAULT_ICON: &str = "📦";

/// Named colours offered by the colour picker, `(name, hex)`.
pub const COLOR_PALETTE: [(&str, &str); 10] = [
    ("Blue", "#3b82f6"),
    ("Purple", "#8b5cf6"),
    ("Pink", "#ec4899"),
    ("Red", "#ef4444"),
    ("Orange", "#f97316"),
    ("Yellow", "#eab308"),
    ("Green", "#10b981"),
    ("Teal", "#14b8a6"),
    ("Cyan", "#06b6d4"),
    ("Gray", "#6b7280"),
];

/// Glyphs offered by the icon picker.
pub const ICON_PALETTE: [&str; 20] = [
    "📦", "📝", "📚", "🎬", "🎵", "🏃", "💼", "🏠", "✈️", "🍔", "💰", "🎯", "⚡", "🌟", "🎨",
    "📱", "💻", "🔧", "🎮", "📷",
];

/// Opaque collection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(Uuid);

impl CollectionId {
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

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for CollectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// A user-defined list and the schema its items follow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    pub schema: Schema,
    /// Hex colour, e.g. `#3b82f6`.
    pub color: String,
    /// Emoji glyph shown next to the name.
    pub icon: String,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub owner: UserId,
}

/// Values required to insert a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCollection {
    pub owner: UserId,
    pub name: String,
    pub schema: Schema,
    pub color: String,
    pub icon: String,
}

/// Partial update applied to a stored collection. `None` leaves a column as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
}

impl CollectionPatch {
    /// Patch that only sets the favourite flag.
    pub fn favorite(is_favorite: bool) -> Self {
        Self {
            is_favorite: Some(is_favorite),
            ..Self::default()
        }
    }

    /// Whether the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.schema.is_none()
            && self.color.is_none()
            && self.icon.is_none()
            && self.is_favorite.is_none()
    }

    /// Apply the patch to an in-memory record.
    pub fn apply_to(&self, collection: &mut Collection) {
        if let Some(name) = &self.name {
            collection.name.clone_from(name);
        }
        if let Some(schema) = &self.schema {
            collection.schema.clone_from(schema);
        }
        if let Some(color) = &self.color {
            collection.color.clone_from(color);
        }
        if let Some(icon) = &self.icon {
            collection.icon.clone_from(icon);
        }
        if let Some(is_favorite) = self.is_favorite {
            collection.is_favorite = is_favorite;
        }
    }
}

/// Display order: favourites first, then newest first.
pub fn display_order(a: &Collection, b: &Collection) -> Ordering {
    b.is_favorite
        .cmp(&a.is_favorite)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// Sort collections in place by [`display_order`].
pub fn sort_for_display(collections: &mut [Collection]) {
    collections.sort_by(display_order);
}

#[cfg(test)]
mod tests {
    //! Regression coverage for collection ordering and patches.

    use super::*;
    use chrono::TimeDelta;
    use rstest::{fixture, rstest};

    fn collection(name: &str, minutes_ago: i64, is_favorite: bool) -> Collection {
        Collection {
            id: CollectionId::random(),
            name: name.to_owned(),
            schema: Schema::default(),
            color: DEFAULT_COLOR.to_owned(),
            icon: DEFAULT_ICON.to_owned(),
            is_favorite,
            created_at: Utc::now() - TimeDelta::minutes(minutes_ago),
            owner: UserId::random(),
        }
    }

    #[fixture]
    fn mixed() -> Vec<Collection> {
        vec![
            collection("old", 30, false),
            collection("new", 1, false),
            collection("fav-old", 60, true),
            collection("fav-new", 5, true),
        ]
    }

    #[rstest]
    fn favourites_precede_others_then_newest_first(mut mixed: Vec<Collection>) {
        sort_for_display(&mut mixed);
        let names: Vec<_> = mixed.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["fav-new", "fav-old", "new", "old"]);
    }

    #[rstest]
    fn patch_applies_only_present_fields() {
        let mut target = collection("Books", 0, false);
        let patch = CollectionPatch {
            icon: Some("📚".to_owned()),
            is_favorite: Some(true),
            ..CollectionPatch::default()
        };
        patch.apply_to(&mut target);
        assert_eq!(target.name, "Books");
        assert_eq!(target.icon, "📚");
        assert!(target.is_favorite);
    }

    #[rstest]
    fn patch_serialises_without_absent_columns() {
        let json = serde_json::to_value(CollectionPatch::favorite(true)).expect("encode patch");
        assert_eq!(json, serde_json::json!({ "is_favorite": true }));
        assert!(CollectionPatch::default().is_empty());
    }

    #[rstest]
    fn palettes_start_with_the_defaults() {
        assert_eq!(COLOR_PALETTE[0].1, DEFAULT_COLOR);
        assert_eq!(ICON_PALETTE[0], DEFAULT_ICON);
    }

    #[rstest]
    fn collection_ids_parse_from_text() {
        let id = CollectionId::random();
        let parsed: CollectionId = format!(" {id} ").parse().expect("valid uuid");
        assert_eq!(parsed, id);
    }
}
