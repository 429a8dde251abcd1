//! Normalized tabular rows.
//!
//! The spreadsheet ingestion layer (outside this workspace) resolves header
//! aliases and produces rows keyed by canonical field names with typed cell
//! values. Everything downstream consumes [`NormalizedRow`] and never touches
//! raw spreadsheet data. Required-column presence is validated before rows
//! reach us; per-row problems are skip-counted by the consumers instead.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

/// One typed cell value from an uploaded spreadsheet.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Free text, already trimmed by the normalizer.
    Text(String),
    /// Numeric value.
    Number(Decimal),
    /// Calendar date.
    Date(NaiveDate),
}

impl FieldValue {
    /// Text content, if this is a text cell.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Decimal content. Numeric text cells are parsed; anything unparseable
    /// yields `None`.
    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(d) => Some(*d),
            FieldValue::Text(s) => Decimal::from_str(s.trim()).ok(),
            FieldValue::Date(_) => None,
        }
    }

    /// Date content, if this is a date cell.
    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<Decimal> for FieldValue {
    fn from(d: Decimal) -> Self {
        FieldValue::Number(d)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::Date(d)
    }
}

/// A single normalized row: canonical field name -> typed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRow {
    fields: HashMap<String, FieldValue>,
}

impl NormalizedRow {
    /// Create an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field value, replacing any previous value.
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> &mut Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Builder-style variant of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.set(field, value);
        self
    }

    /// Raw field access.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Text value of a field, `None` when absent or non-text.
    #[must_use]
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(FieldValue::as_text)
    }

    /// Decimal value of a field, `None` when absent or unparseable.
    #[must_use]
    pub fn decimal(&self, field: &str) -> Option<Decimal> {
        self.fields.get(field).and_then(FieldValue::as_decimal)
    }

    /// Date value of a field, `None` when absent or not a date.
    #[must_use]
    pub fn date(&self, field: &str) -> Option<NaiveDate> {
        self.fields.get(field).and_then(FieldValue::as_date)
    }

    /// Number of populated fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the row has no populated fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_typed_accessors() {
        let row = NormalizedRow::new()
            .with("barcode", "8901234")
            .with("qty", dec!(12.5))
            .with("as_of_date", NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());

        assert_eq!(row.text("barcode"), Some("8901234"));
        assert_eq!(row.decimal("qty"), Some(dec!(12.5)));
        assert_eq!(
            row.date("as_of_date"),
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
        assert_eq!(row.text("missing"), None);
    }

    #[test]
    fn test_numeric_text_parses_as_decimal() {
        let row = NormalizedRow::new().with("qty", " 7.250 ");
        assert_eq!(row.decimal("qty"), Some(dec!(7.250)));
    }

    #[test]
    fn test_garbage_text_is_not_a_decimal() {
        let row = NormalizedRow::new().with("qty", "n/a");
        assert_eq!(row.decimal("qty"), None);
    }

    #[test]
    fn test_set_replaces() {
        let mut row = NormalizedRow::new();
        row.set("outlet", "STORE A");
        row.set("outlet", "STORE B");
        assert_eq!(row.text("outlet"), Some("STORE B"));
        assert_eq!(row.len(), 1);
    }
}
