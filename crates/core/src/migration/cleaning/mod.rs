//! Value cleaning pipeline.
//!
//! Six independent normalizers, each a pure function of `(value, config)`.
//! Every normalizer returns the cleaned value plus human-readable warnings;
//! cleaning never fails a row on its own; the validator decides what blocks.
//!
//! Empty sentinels (`""`, `"N/A"`, `"null"`, `"-"` …) are turned into JSON
//! null before any normalizer runs, whether or not the field has one.

pub mod address;
pub mod currency;
pub mod date;
pub mod email;
pub mod name;
pub mod phone;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Row;

pub use address::AddressConfig;
pub use currency::CurrencyConfig;
pub use date::{DateConfig, ParsedDate};
pub use email::EmailConfig;
pub use name::{NameCase, NameConfig};
pub use phone::{PhoneConfig, PhoneFormat};

/// Default sentinels treated as "no value". Compared case-insensitively
/// after trimming.
pub const DEFAULT_EMPTY_VALUES: &[&str] = &[
    "", "n/a", "na", "null", "none", "nil", "-", "--", "#n/a", "undefined",
];

/// A named value normalizer assignable per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalizer {
    Phone,
    Email,
    Name,
    Address,
    Currency,
    Date,
}

impl Normalizer {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Email => "email",
            Self::Name => "name",
            Self::Address => "address",
            Self::Currency => "currency",
            Self::Date => "date",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "phone" => Some(Self::Phone),
            "email" => Some(Self::Email),
            "name" => Some(Self::Name),
            "address" => Some(Self::Address),
            "currency" => Some(Self::Currency),
            "date" => Some(Self::Date),
            _ => None,
        }
    }
}

/// Per-job cleaning configuration, stored as the job's `cleaning_rules`.
///
/// Every section is optional in JSON; missing sections take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub empty_values: Vec<String>,
    pub phone: PhoneConfig,
    pub email: EmailConfig,
    pub name: NameConfig,
    pub address: AddressConfig,
    pub currency: CurrencyConfig,
    pub date: DateConfig,
    /// Per-field normalizer overrides. A `null` value disables cleaning
    /// for that field.
    pub field_overrides: BTreeMap<String, Option<Normalizer>>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            empty_values: DEFAULT_EMPTY_VALUES.iter().map(|s| s.to_string()).collect(),
            phone: PhoneConfig::default(),
            email: EmailConfig::default(),
            name: NameConfig::default(),
            address: AddressConfig::default(),
            currency: CurrencyConfig::default(),
            date: DateConfig::default(),
            field_overrides: BTreeMap::new(),
        }
    }
}

impl CleaningConfig {
    /// Whether a string is one of the configured empty sentinels.
    pub fn is_empty_value(&self, s: &str) -> bool {
        let trimmed = s.trim();
        self.empty_values
            .iter()
            .any(|e| e.trim().eq_ignore_ascii_case(trimmed))
    }

    /// Apply `field_overrides` on top of registry-assigned normalizers.
    pub fn resolve_normalizers(
        &self,
        defaults: &HashMap<&'static str, Normalizer>,
    ) -> HashMap<String, Normalizer> {
        let mut resolved: HashMap<String, Normalizer> = defaults
            .iter()
            .map(|(field, n)| (field.to_string(), *n))
            .collect();
        for (field, normalizer) in &self.field_overrides {
            match normalizer {
                Some(n) => {
                    resolved.insert(field.clone(), *n);
                }
                None => {
                    resolved.remove(field);
                }
            }
        }
        resolved
    }
}

/// Outcome of cleaning one value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningResult {
    pub value: Value,
    pub warnings: Vec<String>,
    pub original: Value,
}

impl CleaningResult {
    fn unchanged(value: &Value) -> Self {
        Self {
            value: value.clone(),
            warnings: Vec::new(),
            original: value.clone(),
        }
    }
}

/// A cleaning warning with field context, as aggregated by [`clean_row`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningWarning {
    pub field: String,
    pub message: String,
    pub original: Value,
    pub cleaned: Value,
}

/// Clean one value with an optional normalizer.
pub fn clean_value(
    value: &Value,
    normalizer: Option<Normalizer>,
    config: &CleaningConfig,
) -> CleaningResult {
    let text = match value {
        Value::Null => return CleaningResult::unchanged(value),
        Value::String(s) if config.is_empty_value(s) => {
            return CleaningResult {
                value: Value::Null,
                warnings: Vec::new(),
                original: value.clone(),
            }
        }
        Value::String(s) => Some(s.as_str()),
        _ => None,
    };

    let (cleaned, warnings) = match normalizer {
        Some(Normalizer::Phone) => phone::clean(value, &config.phone),
        Some(Normalizer::Email) => email::clean(value, &config.email),
        Some(Normalizer::Name) => name::clean(value, &config.name),
        Some(Normalizer::Address) => address::clean(value, &config.address),
        Some(Normalizer::Currency) => currency::clean(value, &config.currency),
        Some(Normalizer::Date) => date::clean(value, &config.date),
        None => match text {
            Some(s) => (Value::String(s.trim().to_string()), Vec::new()),
            None => (value.clone(), Vec::new()),
        },
    };

    CleaningResult {
        value: cleaned,
        warnings,
        original: value.clone(),
    }
}

/// Clean one value by normalizer name; unknown names only trim.
pub fn clean_value_named(value: &Value, normalizer: &str, config: &CleaningConfig) -> CleaningResult {
    clean_value(value, Normalizer::from_str(normalizer), config)
}

/// Clean every field of a row.
///
/// Fields absent from `normalizers` still get empty-sentinel handling and
/// whitespace trimming.
pub fn clean_row(
    row: &Row,
    normalizers: &HashMap<String, Normalizer>,
    config: &CleaningConfig,
) -> (Row, Vec<CleaningWarning>) {
    let mut cleaned = Row::new();
    let mut warnings = Vec::new();

    for (field, value) in row {
        let result = clean_value(value, normalizers.get(field).copied(), config);
        for message in result.warnings {
            warnings.push(CleaningWarning {
                field: field.clone(),
                message,
                original: result.original.clone(),
                cleaned: result.value.clone(),
            });
        }
        cleaned.insert(field.clone(), result.value);
    }

    (cleaned, warnings)
}

/// Render a scalar JSON value as text for normalizers that accept numbers.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_sentinels_become_null_regardless_of_normalizer() {
        let config = CleaningConfig::default();
        for raw in ["", "  ", "N/A", "null", "NULL", "-", "None", " n/a "] {
            let result = clean_value(&json!(raw), None, &config);
            assert_eq!(result.value, Value::Null, "{raw:?}");
            let result = clean_value(&json!(raw), Some(Normalizer::Currency), &config);
            assert_eq!(result.value, Value::Null, "{raw:?}");
            assert!(result.warnings.is_empty());
        }
    }

    #[test]
    fn custom_empty_values_replace_defaults() {
        let config = CleaningConfig {
            empty_values: vec!["unknown".into()],
            ..Default::default()
        };
        assert_eq!(clean_value(&json!("UNKNOWN"), None, &config).value, Value::Null);
        assert_eq!(clean_value(&json!("N/A"), None, &config).value, json!("N/A"));
    }

    #[test]
    fn plain_strings_are_trimmed() {
        let config = CleaningConfig::default();
        let result = clean_value(&json!("  hello "), None, &config);
        assert_eq!(result.value, json!("hello"));
        assert_eq!(result.original, json!("  hello "));
    }

    #[test]
    fn named_lookup_matches_enum() {
        let config = CleaningConfig::default();
        let result = clean_value_named(&json!("JOHN DOE"), "name", &config);
        assert_eq!(result.value, json!("John Doe"));
        let result = clean_value_named(&json!(" x "), "nonexistent", &config);
        assert_eq!(result.value, json!("x"));
    }

    #[test]
    fn clean_row_aggregates_warnings_with_context() {
        let config = CleaningConfig::default();
        let mut row = Row::new();
        row.insert("email".into(), json!("bob@@x"));
        row.insert("name".into(), json!("  bob   smith "));
        row.insert("notes".into(), json!("N/A"));
        let normalizers: HashMap<String, Normalizer> = [
            ("email".to_string(), Normalizer::Email),
            ("name".to_string(), Normalizer::Name),
        ]
        .into_iter()
        .collect();

        let (cleaned, warnings) = clean_row(&row, &normalizers, &config);
        assert_eq!(cleaned["name"], json!("Bob Smith"));
        assert_eq!(cleaned["notes"], Value::Null);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "email");
        assert_eq!(warnings[0].original, json!("bob@@x"));
    }

    #[test]
    fn overrides_replace_and_disable() {
        let defaults: HashMap<&'static str, Normalizer> =
            [("name", Normalizer::Name), ("phone", Normalizer::Phone)]
                .into_iter()
                .collect();
        let mut config = CleaningConfig::default();
        config.field_overrides.insert("name".into(), None);
        config
            .field_overrides
            .insert("amount".into(), Some(Normalizer::Currency));

        let resolved = config.resolve_normalizers(&defaults);
        assert!(!resolved.contains_key("name"));
        assert_eq!(resolved["phone"], Normalizer::Phone);
        assert_eq!(resolved["amount"], Normalizer::Currency);
    }

    #[test]
    fn config_deserializes_from_partial_json() {
        let config: CleaningConfig =
            serde_json::from_value(json!({"currency": {"decimal_places": 3}})).unwrap();
        assert_eq!(config.currency.decimal_places, 3);
        assert_eq!(config.phone, PhoneConfig::default());
        assert!(config.is_empty_value("N/A"));
    }
}
