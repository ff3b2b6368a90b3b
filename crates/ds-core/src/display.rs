//! Display-string normalisation for hydrated rows.
//!
//! Every value leaving the pipeline is text. The rules, applied in order:
//! temporal values become `dd-mm-YYYY`, null becomes the empty string, lists
//! are joined with `|`, and everything else gets its canonical textual form.
//! A value without a usable representation (non-finite floats) becomes the
//! empty string; conversion never fails.

use crate::types::FieldValue;
use serde_json::Value;

/// Day-month-year, the format used for every temporal value.
pub const DATE_FORMAT: &str = "%d-%m-%Y";

const LIST_SEPARATOR: &str = "|";

pub fn display_string(value: &FieldValue) -> String {
    match value {
        FieldValue::Date(d) => d.format(DATE_FORMAT).to_string(),
        FieldValue::DateTime(dt) => dt.format(DATE_FORMAT).to_string(),
        FieldValue::Null => String::new(),
        FieldValue::Text(s) => s.clone(),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Int(i) => i.to_string(),
        FieldValue::Float(f) if f.is_finite() => f.to_string(),
        FieldValue::Float(_) => String::new(),
        FieldValue::List(items) => items
            .iter()
            .map(display_string)
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR),
    }
}

/// Display form of a search-backend source value.
pub fn display_json(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(_) => value.to_string(),
        other => display_string(&FieldValue::from(other.clone())),
    }
}
