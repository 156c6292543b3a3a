//! Source row → target row: mapping, cleaning, and storage coercion.
//!
//! Validate, preview and execute all run rows through the same
//! [`RowTransformer`] so what the user previews is what gets written.

use std::collections::HashMap;

use bizsuite_core::migration::cleaning::{clean_row, CleaningConfig, CleaningWarning, Normalizer};
use bizsuite_core::migration::cleaning::date::{parse_date, ParsedDate};
use bizsuite_core::migration::mapping::FieldMapping;
use bizsuite_core::migration::registry::{EntityConfig, FieldKind};
use bizsuite_core::migration::validator::{parse_boolean, value_text};
use bizsuite_core::types::Row;
use serde::Serialize;
use serde_json::Value;

/// A mapped and cleaned row plus the cleaning warnings it produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformedRow {
    pub data: Row,
    pub warnings: Vec<CleaningWarning>,
}

impl TransformedRow {
    /// Warnings as `"field: message"` strings.
    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings
            .iter()
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect()
    }
}

pub struct RowTransformer<'a> {
    config: &'a EntityConfig,
    mapping: &'a FieldMapping,
    cleaning: &'a CleaningConfig,
    normalizers: HashMap<String, Normalizer>,
    date_formats: Vec<String>,
}

impl<'a> RowTransformer<'a> {
    pub fn new(config: &'a EntityConfig, mapping: &'a FieldMapping, cleaning: &'a CleaningConfig) -> Self {
        let normalizers = cleaning.resolve_normalizers(&config.normalizer_map());
        // The cleaner's own output format is tried first so re-parsing its
        // output is never ambiguous.
        let date_formats = std::iter::once(cleaning.date.output_format.clone())
            .chain(std::iter::once(cleaning.date.datetime_output_format.clone()))
            .chain(cleaning.date.input_formats.iter().cloned())
            .collect();
        Self {
            config,
            mapping,
            cleaning,
            normalizers,
            date_formats,
        }
    }

    pub fn config(&self) -> &'a EntityConfig {
        self.config
    }

    /// Rename columns to fields and clean every value.
    pub fn transform(&self, source: &Row) -> TransformedRow {
        let mapped = self.mapping.apply(source);
        let (data, warnings) = clean_row(&mapped, &self.normalizers, self.cleaning);
        TransformedRow { data, warnings }
    }

    /// Canonical JSON for each typed field so the database can coerce it:
    /// integers as numbers, booleans as bools, dates as ISO-8601, enum
    /// values in their registered spelling. Values that do not parse are
    /// left unchanged for the database to reject.
    pub fn coerce_for_storage(&self, row: &Row) -> Row {
        row.iter()
            .map(|(key, value)| {
                let coerced = match self.config.field(key) {
                    Some(field) if !value.is_null() => self.coerce(&field.kind, value),
                    _ => None,
                };
                (key.clone(), coerced.unwrap_or_else(|| value.clone()))
            })
            .collect()
    }

    fn coerce(&self, kind: &FieldKind, value: &Value) -> Option<Value> {
        match kind {
            FieldKind::Integer => value_text(value)?.parse::<i64>().ok().map(Value::from),
            FieldKind::Boolean => parse_boolean(value).map(Value::Bool),
            FieldKind::Date => {
                let parsed = parse_date(&value_text(value)?, &self.date_formats)?;
                Some(Value::String(parsed.date().format("%Y-%m-%d").to_string()))
            }
            FieldKind::DateTime => {
                let rendered = match parse_date(&value_text(value)?, &self.date_formats)? {
                    ParsedDate::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
                    ParsedDate::Date(d) => format!("{}T00:00:00", d.format("%Y-%m-%d")),
                };
                Some(Value::String(rendered))
            }
            FieldKind::Enum { values } => {
                let text = value_text(value)?;
                values
                    .iter()
                    .find(|v| v.eq_ignore_ascii_case(&text))
                    .map(|v| Value::String(v.to_string()))
            }
            FieldKind::Decimal => value_text(value).map(Value::String),
            FieldKind::String
            | FieldKind::Email
            | FieldKind::Phone
            | FieldKind::ForeignKey { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizsuite_core::migration::registry::entity_config;
    use bizsuite_core::migration::EntityType;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn maps_then_cleans() {
        let config = entity_config(EntityType::Contacts).unwrap();
        let mapping: FieldMapping = [
            ("Name".to_string(), "name".to_string()),
            ("E-mail".to_string(), "email".to_string()),
            ("Phone".to_string(), "phone".to_string()),
        ]
        .into_iter()
        .collect();
        let cleaning = CleaningConfig::default();
        let transformer = RowTransformer::new(config, &mapping, &cleaning);

        let out = transformer.transform(&row(json!({
            "Name": "  ada   OKAFOR ",
            "E-mail": "Ada@Gmial.com",
            "Phone": "0803 123 4567",
            "Ignored": "x"
        })));
        assert_eq!(out.data["name"], json!("Ada Okafor"));
        assert_eq!(out.data["email"], json!("ada@gmail.com"));
        assert_eq!(out.data["phone"], json!("+2348031234567"));
        assert!(!out.data.contains_key("Ignored"));
        assert!(out.warning_messages().iter().any(|w| w.starts_with("email: ")));
    }

    #[test]
    fn storage_coercion_canonicalizes_typed_fields() {
        let config = entity_config(EntityType::Opportunities).unwrap();
        let mapping = FieldMapping::new();
        let cleaning = CleaningConfig::default();
        let transformer = RowTransformer::new(config, &mapping, &cleaning);

        let out = transformer.coerce_for_storage(&row(json!({
            "probability": "40",
            "stage": "PROSPECTING",
            "expected_close_date": "2024-12-31",
            "title": "Renewal"
        })));
        assert_eq!(out["probability"], json!(40));
        assert_eq!(out["stage"], json!("prospecting"));
        assert_eq!(out["expected_close_date"], json!("2024-12-31"));
        assert_eq!(out["title"], json!("Renewal"));
    }
}
