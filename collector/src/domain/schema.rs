//! Collection schema model.
//!
//! A [`Schema`] is the ordered list of [`Field`] definitions that describes
//! the shape of every item in a collection. Schemas are plain data; the
//! editing rules used while a collection is being defined live on
//! [`SchemaDraft`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Error;

/// Value type declared for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Free text.
    #[default]
    Text,
    /// Numeric value entered as text and stored as a JSON number.
    Number,
    /// Calendar date entered as `YYYY-MM-DD`.
    Date,
    /// Yes/no toggle.
    Boolean,
}

impl FieldType {
    /// Every field type, in the order offered when defining a schema.
    pub const ALL: [Self; 4] = [Self::Text, Self::Number, Self::Date, Self::Boolean];

    /// Stable lowercase name used in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown field type name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown field type `{0}`; expected text, number, date or boolean")]
pub struct UnknownFieldType(pub String);

impl std::str::FromStr for FieldType {
    type Err = UnknownFieldType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "number" => Ok(Self::Number),
            "date" => Ok(Self::Date),
            "boolean" | "bool" => Ok(Self::Boolean),
            _ => Err(UnknownFieldType(s.to_owned())),
        }
    }
}

/// A single field definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Display name, also used as the key in item data.
    pub name: String,
    /// Declared value type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether a value must be supplied when an item is submitted.
    #[serde(default)]
    pub required: bool,
}

impl Field {
    /// Build a field definition.
    pub fn new(name: impl Into<String>, field_type: FieldType, required: bool) -> Self {
        Self {
            name: name.into(),
            field_type,
            required,
        }
    }
}

/// Ordered field definitions. Field order is display order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Fields in display order.
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Schema {
    /// Wrap an ordered field list.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Look up a field by exact name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Declared type of the named field, if the schema has it.
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.field(name).map(|field| field.field_type)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Rule violations raised while editing a [`SchemaDraft`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaDraftError {
    /// A field was added without a name.
    #[error("Field name is required")]
    EmptyFieldName,
    /// A field with the same name (ignoring case) already exists.
    #[error("Field {name} already exists")]
    DuplicateFieldName { name: String },
    /// The collection name is blank.
    #[error("Collection name is required")]
    EmptyCollectionName,
    /// The schema has no fields.
    #[error("Collection must have at least one field")]
    NoFields,
}

impl From<SchemaDraftError> for Error {
    fn from(value: SchemaDraftError) -> Self {
        Self::invalid_request(value.to_string())
    }
}

/// Work-in-progress collection definition: a name plus a mutable field list.
///
/// # Examples
/// ```
/// use collector::domain::{FieldType, SchemaDraft};
///
/// let mut draft = SchemaDraft::new("Books");
/// draft.add_field("Title", FieldType::Text, true).expect("valid field");
/// draft.add_field("Pages", FieldType::Number, false).expect("valid field");
/// let (name, schema) = draft.finish().expect("complete draft");
/// assert_eq!(name, "Books");
/// assert_eq!(schema.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDraft {
    name: String,
    fields: Vec<Field>,
}

impl SchemaDraft {
    /// Start a draft with the given collection name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Start a draft from an existing collection's name and schema.
    pub fn from_existing(name: impl Into<String>, schema: &Schema) -> Self {
        Self {
            name: name.into(),
            fields: schema.fields.clone(),
        }
    }

    /// Replace the pending collection name.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Fields added so far.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Append a field. The name is trimmed and must be unique within the draft.
    pub fn add_field(
        &mut self,
        name: &str,
        field_type: FieldType,
        required: bool,
    ) -> Result<&Field, SchemaDraftError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(SchemaDraftError::EmptyFieldName);
        }
        if self
            .fields
            .iter()
            .any(|field| field.name.eq_ignore_ascii_case(trimmed))
        {
            return Err(SchemaDraftError::DuplicateFieldName {
                name: trimmed.to_owned(),
            });
        }
        self.fields.push(Field::new(trimmed, field_type, required));
        Ok(&self.fields[self.fields.len() - 1])
    }

    /// Remove the field at `index`. Stored item data for that field is kept.
    pub fn remove_field(&mut self, index: usize) -> Option<Field> {
        (index < self.fields.len()).then(|| self.fields.remove(index))
    }

    /// Validate the draft and return the trimmed name and final schema.
    pub fn finish(self) -> Result<(String, Schema), SchemaDraftError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(SchemaDraftError::EmptyCollectionName);
        }
        if self.fields.is_empty() {
            return Err(SchemaDraftError::NoFields);
        }
        Ok((name.to_owned(), Schema::new(self.fields)))
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for schema serialisation and draft editing rules.

    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn schema_round_trips_storage_shape() {
        let stored = json!({
            "fields": [
                { "name": "Title", "type": "text", "required": true },
                { "name": "Read", "type": "boolean", "required": false }
            ]
        });
        let schema: Schema = serde_json::from_value(stored.clone()).expect("decode schema");
        assert_eq!(schema.field_type("Read"), Some(FieldType::Boolean));
        assert_eq!(serde_json::to_value(&schema).expect("encode schema"), stored);
    }

    #[rstest]
    fn missing_required_flag_defaults_to_false() {
        let schema: Schema = serde_json::from_value(json!({
            "fields": [{ "name": "Notes", "type": "text" }]
        }))
        .expect("decode schema");
        assert!(!schema.fields[0].required);
    }

    #[rstest]
    #[case("text", FieldType::Text)]
    #[case(" Number ", FieldType::Number)]
    #[case("DATE", FieldType::Date)]
    #[case("bool", FieldType::Boolean)]
    fn parses_field_type_names(#[case] raw: &str, #[case] expected: FieldType) {
        assert_eq!(raw.parse::<FieldType>(), Ok(expected));
    }

    #[rstest]
    fn rejects_unknown_field_type_names() {
        assert!("colour".parse::<FieldType>().is_err());
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn add_field_rejects_blank_names(#[case] name: &str) {
        let mut draft = SchemaDraft::new("Books");
        let err = draft
            .add_field(name, FieldType::Text, false)
            .expect_err("blank names are rejected");
        assert_eq!(err.to_string(), "Field name is required");
    }

    #[rstest]
    fn add_field_rejects_duplicates_ignoring_case() {
        let mut draft = SchemaDraft::new("Books");
        draft
            .add_field("Title", FieldType::Text, true)
            .expect("first field");
        let err = draft
            .add_field("title ", FieldType::Number, false)
            .expect_err("duplicate");
        assert_eq!(
            err,
            SchemaDraftError::DuplicateFieldName {
                name: "title".to_owned()
            }
        );
    }

    #[rstest]
    fn remove_field_ignores_out_of_range_indices() {
        let mut draft = SchemaDraft::new("Books");
        draft
            .add_field("Title", FieldType::Text, true)
            .expect("field");
        assert!(draft.remove_field(3).is_none());
        assert_eq!(draft.remove_field(0).map(|f| f.name), Some("Title".to_owned()));
        assert!(draft.fields().is_empty());
    }

    #[rstest]
    #[case::blank_name("  ", true, SchemaDraftError::EmptyCollectionName)]
    #[case::no_fields("Books", false, SchemaDraftError::NoFields)]
    fn finish_enforces_name_and_fields(
        #[case] name: &str,
        #[case] with_field: bool,
        #[case] expected: SchemaDraftError,
    ) {
        let mut draft = SchemaDraft::new(name);
        if with_field {
            draft
                .add_field("Title", FieldType::Text, false)
                .expect("field");
        }
        assert_eq!(draft.finish(), Err(expected));
    }

    #[rstest]
    fn from_existing_keeps_field_order() {
        let schema = Schema::new(vec![
            Field::new("B", FieldType::Text, false),
            Field::new("A", FieldType::Date, true),
        ]);
        let mut draft = SchemaDraft::from_existing("  Films ", &schema);
        draft
            .add_field("C", FieldType::Boolean, false)
            .expect("field");
        let (name, finished) = draft.finish().expect("complete");
        assert_eq!(name, "Films");
        let names: Vec<_> = finished.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["B", "A", "C"]);
    }
}
