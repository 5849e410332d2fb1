//! Schema-driven item form.
//!
//! [`FormState`] holds the raw, user-entered value for every field of a
//! schema and describes the control each field needs. Submitting the form
//! runs a per-type rule taken from a dispatch table ([`rule_for`]) over the
//! fields in order and stops at the first failure. Successful submissions
//! coerce number fields into JSON numbers and produce the [`ItemData`] that
//! the item store persists.

use std::collections::BTreeMap;

use serde_json::{Number, Value};
use thiserror::Error;

use super::{Error, Field, FieldType, Item, ItemData, Schema};

/// Hint shown under date inputs.
pub const DATE_FORMAT_HINT: &str = "Format: YYYY-MM-DD";
/// Placeholder shown inside date inputs.
pub const DATE_PLACEHOLDER: &str = "YYYY-MM-DD";

/// Raw value held by a form control before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// Text typed into an entry control.
    Text(String),
    /// State of a toggle control.
    Flag(bool),
}

impl RawValue {
    fn initial(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Boolean => Self::Flag(false),
            FieldType::Text | FieldType::Number | FieldType::Date => Self::Text(String::new()),
        }
    }

    fn from_stored(field_type: FieldType, stored: Option<&Value>) -> Self {
        match (field_type, stored) {
            (FieldType::Boolean, Some(Value::Bool(flag))) => Self::Flag(*flag),
            (FieldType::Boolean, _) => Self::Flag(false),
            (_, None | Some(Value::Null)) => Self::Text(String::new()),
            (_, Some(Value::String(text))) => Self::Text(text.clone()),
            (_, Some(other)) => Self::Text(other.to_string()),
        }
    }
}

/// Kind of input control a field is rendered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlKind {
    /// On/off switch.
    Toggle { value: bool },
    /// Text entry with a numeric keyboard.
    NumericEntry { value: String },
    /// Free-text entry with a fixed date-format hint.
    DateEntry { value: String, hint: &'static str },
    /// Free-text entry.
    TextEntry { value: String },
}

/// Everything a front end needs to render one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldControl {
    pub name: String,
    /// Field name, suffixed with ` *` when required.
    pub label: String,
    pub required: bool,
    pub kind: ControlKind,
    /// Placeholder text; `None` for toggles.
    pub placeholder: Option<String>,
}

/// Reason a single field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRuleViolation {
    /// A required value is missing.
    Required,
    /// The text does not parse to a finite number.
    InvalidNumber,
    /// The control holds a value of the wrong shape for the field type.
    WrongShape,
}

/// First validation failure found while submitting a form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormValidationError {
    #[error("{field} is required")]
    Required { field: String },
    #[error("{field} must be a valid number")]
    InvalidNumber { field: String },
    #[error("{field} has an unexpected value")]
    WrongShape { field: String },
}

impl FormValidationError {
    fn from_violation(field: &Field, violation: FieldRuleViolation) -> Self {
        let field = field.name.clone();
        match violation {
            FieldRuleViolation::Required => Self::Required { field },
            FieldRuleViolation::InvalidNumber => Self::InvalidNumber { field },
            FieldRuleViolation::WrongShape => Self::WrongShape { field },
        }
    }

    /// Name of the field that failed.
    pub fn field(&self) -> &str {
        match self {
            Self::Required { field } | Self::InvalidNumber { field } | Self::WrongShape { field } => {
                field
            }
        }
    }
}

impl From<FormValidationError> for Error {
    fn from(value: FormValidationError) -> Self {
        let field = value.field().to_owned();
        Self::invalid_request(value.to_string()).with_details(serde_json::json!({ "field": field }))
    }
}

/// Rule applied to one raw value. `Ok(None)` means "store nothing".
pub type FieldRule = fn(&RawValue, bool) -> Result<Option<Value>, FieldRuleViolation>;

/// Dispatch table from field type to its validation/coercion rule.
pub fn rule_for(field_type: FieldType) -> FieldRule {
    match field_type {
        FieldType::Text | FieldType::Date => text_rule,
        FieldType::Number => number_rule,
        FieldType::Boolean => boolean_rule,
    }
}

fn text_rule(raw: &RawValue, required: bool) -> Result<Option<Value>, FieldRuleViolation> {
    let RawValue::Text(text) = raw else {
        return Err(FieldRuleViolation::WrongShape);
    };
    if required && text.is_empty() {
        return Err(FieldRuleViolation::Required);
    }
    Ok(Some(Value::String(text.clone())))
}

fn number_rule(raw: &RawValue, required: bool) -> Result<Option<Value>, FieldRuleViolation> {
    let RawValue::Text(text) = raw else {
        return Err(FieldRuleViolation::WrongShape);
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return if required {
            Err(FieldRuleViolation::Required)
        } else {
            Ok(None)
        };
    }
    parse_number(trimmed)
        .map(Some)
        .ok_or(FieldRuleViolation::InvalidNumber)
}

fn boolean_rule(raw: &RawValue, _required: bool) -> Result<Option<Value>, FieldRuleViolation> {
    match raw {
        RawValue::Flag(flag) => Ok(Some(Value::Bool(*flag))),
        RawValue::Text(_) => Err(FieldRuleViolation::WrongShape),
    }
}

/// Parse text into a finite JSON number. Integral values become integers.
fn parse_number(text: &str) -> Option<Value> {
    if let Ok(integer) = text.parse::<i64>() {
        return Some(Value::Number(integer.into()));
    }
    let float = text.parse::<f64>().ok().filter(|value| value.is_finite())?;
    // Whole floats within the i64 range are stored without a fraction.
    if float.fract() == 0.0 && float.abs() < 9.007_199_254_740_992e15 {
        let whole = float as i64;
        return Some(Value::Number(whole.into()));
    }
    Number::from_f64(float).map(Value::Number)
}

/// Validate `values` against `schema`, fail-fast, and build the item payload.
///
/// Fields missing from `values` are treated as their initial control state.
pub fn validate(
    schema: &Schema,
    values: &BTreeMap<String, RawValue>,
) -> Result<ItemData, FormValidationError> {
    let mut data = ItemData::new();
    for field in &schema.fields {
        let fallback;
        let raw = match values.get(&field.name) {
            Some(raw) => raw,
            None => {
                fallback = RawValue::initial(field.field_type);
                &fallback
            }
        };
        let rule = rule_for(field.field_type);
        match rule(raw, field.required) {
            Ok(Some(value)) => {
                data.insert(field.name.clone(), value);
            }
            Ok(None) => {}
            Err(violation) => return Err(FormValidationError::from_violation(field, violation)),
        }
    }
    Ok(data)
}

/// Editable state for one item form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    schema: Schema,
    values: BTreeMap<String, RawValue>,
}

impl FormState {
    /// Blank form: toggles off, entries empty.
    pub fn new(schema: &Schema) -> Self {
        let values = schema
            .fields
            .iter()
            .map(|field| (field.name.clone(), RawValue::initial(field.field_type)))
            .collect();
        Self {
            schema: schema.clone(),
            values,
        }
    }

    /// Form prefilled from an existing item, for editing.
    pub fn from_item(schema: &Schema, item: &Item) -> Self {
        let values = schema
            .fields
            .iter()
            .map(|field| {
                let raw = RawValue::from_stored(field.field_type, item.data.get(&field.name));
                (field.name.clone(), raw)
            })
            .collect();
        Self {
            schema: schema.clone(),
            values,
        }
    }

    /// Schema the form was built from.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Current raw value of a field.
    pub fn value(&self, name: &str) -> Option<&RawValue> {
        self.values.get(name)
    }

    /// Set the text of an entry control. Returns `false` for unknown fields.
    pub fn set_text(&mut self, name: &str, text: impl Into<String>) -> bool {
        self.set(name, RawValue::Text(text.into()))
    }

    /// Set the state of a toggle control. Returns `false` for unknown fields.
    pub fn set_flag(&mut self, name: &str, flag: bool) -> bool {
        self.set(name, RawValue::Flag(flag))
    }

    fn set(&mut self, name: &str, raw: RawValue) -> bool {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = raw;
                true
            }
            None => false,
        }
    }

    /// Describe the control for every field, in schema order.
    pub fn controls(&self) -> Vec<FieldControl> {
        self.schema
            .fields
            .iter()
            .map(|field| self.control_for(field))
            .collect()
    }

    fn control_for(&self, field: &Field) -> FieldControl {
        let text = || match self.values.get(&field.name) {
            Some(RawValue::Text(text)) => text.clone(),
            _ => String::new(),
        };
        let entry_placeholder = || Some(format!("Enter {}", field.name.to_lowercase()));
        let (kind, placeholder) = match field.field_type {
            FieldType::Boolean => {
                let value = matches!(self.values.get(&field.name), Some(RawValue::Flag(true)));
                (ControlKind::Toggle { value }, None)
            }
            FieldType::Number => (ControlKind::NumericEntry { value: text() }, entry_placeholder()),
            FieldType::Date => (
                ControlKind::DateEntry {
                    value: text(),
                    hint: DATE_FORMAT_HINT,
                },
                Some(DATE_PLACEHOLDER.to_owned()),
            ),
            FieldType::Text => (ControlKind::TextEntry { value: text() }, entry_placeholder()),
        };
        let label = if field.required {
            format!("{} *", field.name)
        } else {
            field.name.clone()
        };
        FieldControl {
            name: field.name.clone(),
            label,
            required: field.required,
            kind,
            placeholder,
        }
    }

    /// Validate and coerce the current values into an item payload.
    pub fn submit(&self) -> Result<ItemData, FormValidationError> {
        validate(&self.schema, &self.values)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for form controls, validation and coercion.

    use super::*;
    use crate::domain::{CollectionId, ItemId};
    use chrono::Utc;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn books() -> Schema {
        Schema::new(vec![
            Field::new("Title", FieldType::Text, true),
            Field::new("Qty", FieldType::Number, false),
        ])
    }

    fn submit(schema: &Schema, title: &str, qty: &str) -> Result<ItemData, FormValidationError> {
        let mut form = FormState::new(schema);
        form.set_text("Title", title);
        form.set_text("Qty", qty);
        form.submit()
    }

    #[rstest]
    fn blank_required_title_fails_first(books: Schema) {
        let err = submit(&books, "", "5").expect_err("title missing");
        assert_eq!(err.to_string(), "Title is required");
    }

    #[rstest]
    fn non_numeric_quantity_fails(books: Schema) {
        let err = submit(&books, "Book", "abc").expect_err("bad number");
        assert_eq!(err.to_string(), "Qty must be a valid number");
    }

    #[rstest]
    fn empty_optional_number_is_omitted(books: Schema) {
        let data = submit(&books, "Book", "").expect("valid");
        assert_eq!(Value::Object(data), json!({ "Title": "Book" }));
    }

    #[rstest]
    fn validation_is_fail_fast_in_schema_order(books: Schema) {
        let err = submit(&books, "", "abc").expect_err("both invalid");
        assert_eq!(err.field(), "Title");
    }

    #[rstest]
    fn whitespace_counts_as_a_required_text_value(books: Schema) {
        let data = submit(&books, "  ", "").expect("whitespace is a value");
        assert_eq!(data.get("Title"), Some(&json!("  ")));
    }

    #[rstest]
    #[case("5", json!(5))]
    #[case(" 12 ", json!(12))]
    #[case("2.50", json!(2.5))]
    #[case("-0.25", json!(-0.25))]
    #[case("1e3", json!(1000))]
    fn numbers_are_coerced(books: Schema, #[case] raw: &str, #[case] expected: Value) {
        let data = submit(&books, "Book", raw).expect("valid");
        assert_eq!(data.get("Qty"), Some(&expected));
    }

    #[rstest]
    #[case("inf")]
    #[case("NaN")]
    #[case("1e400")]
    #[case("12abc")]
    fn non_finite_numbers_are_rejected(books: Schema, #[case] raw: &str) {
        let err = submit(&books, "Book", raw).expect_err("not finite");
        assert!(matches!(err, FormValidationError::InvalidNumber { .. }));
    }

    #[rstest]
    fn required_number_rejects_blank() {
        let schema = Schema::new(vec![Field::new("Price", FieldType::Number, true)]);
        let mut form = FormState::new(&schema);
        form.set_text("Price", "  ");
        assert_eq!(
            form.submit(),
            Err(FormValidationError::Required {
                field: "Price".to_owned()
            })
        );
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn booleans_always_validate(#[case] required: bool) {
        let schema = Schema::new(vec![Field::new("Done", FieldType::Boolean, required)]);
        let data = FormState::new(&schema).submit().expect("toggle validates");
        assert_eq!(data.get("Done"), Some(&json!(false)));
    }

    #[rstest]
    fn optional_text_keeps_empty_string() {
        let schema = Schema::new(vec![Field::new("Notes", FieldType::Date, false)]);
        let data = FormState::new(&schema).submit().expect("optional");
        assert_eq!(data.get("Notes"), Some(&json!("")));
    }

    #[rstest]
    fn wrong_control_shape_is_reported() {
        let schema = Schema::new(vec![Field::new("Done", FieldType::Boolean, false)]);
        let mut form = FormState::new(&schema);
        form.set_text("Done", "yes");
        assert!(matches!(
            form.submit(),
            Err(FormValidationError::WrongShape { .. })
        ));
    }

    #[rstest]
    fn unknown_fields_are_not_settable(books: Schema) {
        let mut form = FormState::new(&books);
        assert!(!form.set_text("Author", "Herbert"));
        assert!(form.value("Author").is_none());
    }

    #[rstest]
    fn controls_follow_field_types() {
        let schema = Schema::new(vec![
            Field::new("Title", FieldType::Text, true),
            Field::new("Qty", FieldType::Number, false),
            Field::new("Due", FieldType::Date, false),
            Field::new("Done", FieldType::Boolean, false),
        ]);
        let controls = FormState::new(&schema).controls();

        assert_eq!(controls[0].label, "Title *");
        assert_eq!(controls[0].placeholder.as_deref(), Some("Enter title"));
        assert!(matches!(controls[1].kind, ControlKind::NumericEntry { .. }));
        assert_eq!(
            controls[2].kind,
            ControlKind::DateEntry {
                value: String::new(),
                hint: DATE_FORMAT_HINT
            }
        );
        assert_eq!(controls[2].placeholder.as_deref(), Some(DATE_PLACEHOLDER));
        assert_eq!(controls[3].kind, ControlKind::Toggle { value: false });
        assert!(controls[3].placeholder.is_none());
    }

    #[rstest]
    fn edit_form_prefills_from_item(books: Schema) {
        let mut data = ItemData::new();
        data.insert("Title".to_owned(), json!("Dune"));
        data.insert("Qty".to_owned(), json!(3));
        data.insert("Removed".to_owned(), json!("kept in storage"));
        let item = Item {
            id: ItemId::random(),
            collection_id: CollectionId::random(),
            data,
            created_at: Utc::now(),
        };

        let form = FormState::from_item(&books, &item);
        assert_eq!(form.value("Qty"), Some(&RawValue::Text("3".to_owned())));
        let resubmitted = form.submit().expect("round trip");
        assert_eq!(resubmitted.get("Qty"), Some(&json!(3)));
        assert!(resubmitted.get("Removed").is_none());
    }

    #[rstest]
    fn validation_errors_convert_to_invalid_request(books: Schema) {
        let err: Error = submit(&books, "", "").expect_err("missing").into();
        assert_eq!(err.code(), crate::domain::ErrorCode::InvalidRequest);
        assert_eq!(err.details(), Some(&json!({ "field": "Title" })));
    }
}
