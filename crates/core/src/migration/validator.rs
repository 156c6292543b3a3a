//! Schema validation of mapped, cleaned rows.
//!
//! Type and presence problems are errors and block the job from reaching
//! `validated`. Email and phone format problems are warnings only.
//! Database-backed checks (foreign keys, dependency counts) live in the
//! `bizsuite-migration` crate and feed into the same [`ValidationResult`].

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Row;

use super::cleaning::date::{parse_date, DEFAULT_INPUT_FORMATS};
use super::cleaning::email::is_valid_email;
use super::registry::{EntityConfig, FieldConfig, FieldKind};

/// Batch validation stops once this many errors have accumulated.
pub const MAX_VALIDATION_ERRORS: usize = 100;

pub const BOOLEAN_TRUE_TOKENS: &[&str] = &["true", "yes", "y", "1", "t", "on"];
pub const BOOLEAN_FALSE_TOKENS: &[&str] = &["false", "no", "n", "0", "f", "off"];

const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

/// One problem found in the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    /// 1-based row number, when the issue belongs to a row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            row: None,
            value: None,
            message: message.into(),
        }
    }

    pub fn at_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// Accumulated outcome of validation. Stored on the job as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub info: Vec<String>,
}

impl ValidationResult {
    /// Valid means no blocking errors; warnings are allowed.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    pub fn warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.info.extend(other.info);
    }
}

/// Parse a boolean from the fixed token set (case-insensitive).
pub fn parse_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => {
            let token = s.trim().to_lowercase();
            if BOOLEAN_TRUE_TOKENS.contains(&token.as_str()) {
                Some(true)
            } else if BOOLEAN_FALSE_TOKENS.contains(&token.as_str()) {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Trimmed text of a scalar value; `None` for null, blank, or composite
/// values.
pub fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Validate one row against the entity schema.
///
/// Fields not declared by the entity are ignored.
pub fn validate_row(row: &Row, row_number: usize, config: &EntityConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    for field in &config.fields {
        let value = row.get(field.name);
        if is_missing(value) {
            if field.required {
                result.error(
                    ValidationIssue::new(
                        field.name,
                        format!("Required field '{}' is missing", field.name),
                    )
                    .at_row(row_number),
                );
            }
            continue;
        }
        let Some(value) = value else { continue };
        check_field(field, value, row_number, &mut result);
    }

    result
}

fn check_field(field: &FieldConfig, value: &Value, row: usize, result: &mut ValidationResult) {
    let issue = |message: String| {
        ValidationIssue::new(field.name, message)
            .at_row(row)
            .with_value(value.clone())
    };

    let Some(text) = value_text(value) else {
        result.error(issue(format!("'{}' must be a scalar value", field.name)));
        return;
    };

    if let Some(max) = field.max_length {
        let len = text.chars().count();
        if len > max {
            result.error(issue(format!(
                "'{}' is {len} characters; maximum is {max}",
                field.name
            )));
        }
    }

    match &field.kind {
        FieldKind::String | FieldKind::ForeignKey { .. } => {}
        FieldKind::Integer => {
            if text.parse::<i64>().is_err() {
                result.error(issue(format!("'{}' must be a whole number", field.name)));
            }
        }
        FieldKind::Decimal => {
            if BigDecimal::from_str(&text).is_err() {
                result.error(issue(format!("'{}' must be a decimal number", field.name)));
            }
        }
        FieldKind::Boolean => {
            if parse_boolean(value).is_none() {
                result.error(issue(format!(
                    "'{}' must be a yes/no value (true, false, yes, no, 1, 0)",
                    field.name
                )));
            }
        }
        FieldKind::Date | FieldKind::DateTime => {
            if parse_date(&text, DEFAULT_INPUT_FORMATS).is_none() {
                result.error(issue(format!("'{}' is not a recognizable date", field.name)));
            }
        }
        FieldKind::Enum { values } => {
            if !values.iter().any(|v| v.eq_ignore_ascii_case(&text)) {
                result.error(issue(format!(
                    "'{}' must be one of: {}",
                    field.name,
                    values.join(", ")
                )));
            }
        }
        FieldKind::Email => {
            if !is_valid_email(&text) {
                result.warning(issue(format!("'{text}' does not look like an email address")));
            }
        }
        FieldKind::Phone => {
            let digits = text.chars().filter(char::is_ascii_digit).count();
            if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits) {
                result.warning(issue(format!("'{text}' does not look like a phone number")));
            }
        }
    }
}

/// Validate all rows with the default error cap.
pub fn validate_batch(rows: &[Row], config: &EntityConfig) -> ValidationResult {
    validate_batch_capped(rows, config, MAX_VALIDATION_ERRORS)
}

/// Validate rows in order (row numbers are 1-based), stopping once
/// `max_errors` errors have accumulated.
pub fn validate_batch_capped(
    rows: &[Row],
    config: &EntityConfig,
    max_errors: usize,
) -> ValidationResult {
    let mut result = ValidationResult::default();

    for (index, row) in rows.iter().enumerate() {
        result.merge(validate_row(row, index + 1, config));
        if result.errors.len() >= max_errors {
            result.errors.truncate(max_errors);
            result.info.push(format!(
                "Validation stopped at row {} after {max_errors} errors; remaining rows were not checked",
                index + 1
            ));
            break;
        }
    }

    result
}

/// A same-file duplicate: `duplicate_row` repeats `first_row`'s value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicatePair {
    pub field: String,
    pub value: String,
    pub first_row: usize,
    pub duplicate_row: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateReport {
    pub pairs: Vec<DuplicatePair>,
    /// Field → number of duplicate rows found for it.
    pub counts: BTreeMap<String, usize>,
}

impl DuplicateReport {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Express the report as warnings attributed to the duplicate rows.
    pub fn to_warnings(&self) -> Vec<ValidationIssue> {
        self.pairs
            .iter()
            .map(|p| {
                ValidationIssue::new(
                    &p.field,
                    format!(
                        "Duplicate value '{}' (first seen in row {})",
                        p.value, p.first_row
                    ),
                )
                .at_row(p.duplicate_row)
                .with_value(Value::String(p.value.clone()))
            })
            .collect()
    }
}

/// Find rows that repeat an earlier row's value in any dedup field.
///
/// Matching is on trimmed, lowercased text. Blank values never match.
pub fn detect_duplicates<S: AsRef<str>>(rows: &[Row], dedup_fields: &[S]) -> DuplicateReport {
    let mut report = DuplicateReport::default();

    for field in dedup_fields {
        let field = field.as_ref();
        let mut first_seen: HashMap<String, usize> = HashMap::new();
        for (index, row) in rows.iter().enumerate() {
            let Some(text) = row.get(field).and_then(value_text) else {
                continue;
            };
            let key = text.to_lowercase();
            let row_number = index + 1;
            match first_seen.get(&key) {
                Some(&first_row) => {
                    report.pairs.push(DuplicatePair {
                        field: field.to_string(),
                        value: text,
                        first_row,
                        duplicate_row: row_number,
                    });
                    *report.counts.entry(field.to_string()).or_default() += 1;
                }
                None => {
                    first_seen.insert(key, row_number);
                }
            }
        }
    }

    report
}

/// Distinct non-blank values of `field` across `rows`, each with the 1-based
/// rows that reference it.
pub fn collect_reference_values(rows: &[Row], field: &str) -> BTreeMap<String, Vec<usize>> {
    let mut values: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (index, row) in rows.iter().enumerate() {
        if let Some(text) = row.get(field).and_then(value_text) {
            values.entry(text).or_default().push(index + 1);
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::registry::entity_config;
    use crate::migration::EntityType;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn contacts() -> &'static EntityConfig {
        entity_config(EntityType::Contacts).unwrap()
    }

    #[test]
    fn missing_required_is_error() {
        let result = validate_row(&row(&[("email", json!("a@b.co"))]), 3, contacts());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "name");
        assert_eq!(result.errors[0].row, Some(3));
    }

    #[test]
    fn blank_required_is_error() {
        let result = validate_row(&row(&[("name", json!("   "))]), 1, contacts());
        assert!(!result.is_valid());
    }

    #[test]
    fn bad_email_and_phone_are_warnings_only() {
        let result = validate_row(
            &row(&[
                ("name", json!("Bob")),
                ("email", json!("bob@@x")),
                ("phone", json!("12")),
            ]),
            2,
            contacts(),
        );
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.warnings[0].value, Some(json!("bob@@x")));
    }

    #[test]
    fn typed_fields() {
        let accounts = entity_config(EntityType::Accounts).unwrap();
        let result = validate_row(
            &row(&[
                ("code", json!("1000")),
                ("name", json!("Cash")),
                ("account_type", json!("ASSET")),
                ("is_active", json!("maybe")),
            ]),
            1,
            accounts,
        );
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "is_active");

        let result = validate_row(
            &row(&[
                ("code", json!("1000")),
                ("name", json!("Cash")),
                ("account_type", json!("asset-ish")),
            ]),
            1,
            accounts,
        );
        assert_eq!(result.errors[0].field, "account_type");
    }

    #[test]
    fn decimal_and_date_checks() {
        let tax = entity_config(EntityType::TaxRates).unwrap();
        let ok = validate_row(&row(&[("name", json!("VAT")), ("rate", json!("7.5"))]), 1, tax);
        assert!(ok.is_valid());
        let bad = validate_row(&row(&[("name", json!("VAT")), ("rate", json!("7.5%"))]), 1, tax);
        assert_eq!(bad.errors[0].field, "rate");

        let invoices = entity_config(EntityType::Invoices).unwrap();
        let result = validate_row(
            &row(&[
                ("invoice_number", json!("INV-1")),
                ("customer_id", json!("Acme")),
                ("invoice_date", json!("not a date")),
                ("total_amount", json!("100.00")),
            ]),
            1,
            invoices,
        );
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "invoice_date");
    }

    #[test]
    fn max_length_enforced() {
        let long = "x".repeat(300);
        let result = validate_row(&row(&[("name", json!(long))]), 1, contacts());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("maximum is 255"));
    }

    #[test]
    fn boolean_tokens() {
        for t in ["TRUE", "yes", "Y", "1", "on", "t"] {
            assert_eq!(parse_boolean(&json!(t)), Some(true), "{t}");
        }
        for f in ["false", "No", "n", "0", "OFF", "F"] {
            assert_eq!(parse_boolean(&json!(f)), Some(false), "{f}");
        }
        assert_eq!(parse_boolean(&json!(1)), Some(true));
        assert_eq!(parse_boolean(&json!("2")), None);
    }

    #[test]
    fn batch_stops_after_error_cap() {
        let rows: Vec<Row> = (0..150).map(|_| Row::new()).collect();
        let result = validate_batch(&rows, contacts());
        assert_eq!(result.errors.len(), MAX_VALIDATION_ERRORS);
        assert_eq!(result.info.len(), 1);
        assert_eq!(result.errors.last().unwrap().row, Some(100));
    }

    #[test]
    fn batch_numbers_rows_from_one() {
        let rows = vec![
            row(&[("name", json!("Ada"))]),
            row(&[("name", json!(null))]),
        ];
        let result = validate_batch(&rows, contacts());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].row, Some(2));
        assert!(result.info.is_empty());
    }

    #[test]
    fn duplicate_pair_is_case_and_whitespace_insensitive() {
        let rows = vec![
            row(&[("email", json!("Ada@Example.com"))]),
            row(&[("email", json!("  ada@example.com "))]),
        ];
        let report = detect_duplicates(&rows, &["email"]);
        assert_eq!(report.pairs.len(), 1);
        assert_eq!(report.pairs[0].first_row, 1);
        assert_eq!(report.pairs[0].duplicate_row, 2);
        assert_eq!(report.counts["email"], 1);
    }

    #[test]
    fn blanks_never_duplicate() {
        let rows = vec![
            row(&[("email", json!(""))]),
            row(&[("email", json!(null))]),
            row(&[("email", json!(""))]),
        ];
        assert!(detect_duplicates(&rows, &["email"]).is_empty());
    }

    #[test]
    fn duplicate_warnings_point_at_later_row() {
        let rows = vec![
            row(&[("name", json!("X"))]),
            row(&[("name", json!("y"))]),
            row(&[("name", json!("x"))]),
        ];
        let warnings = detect_duplicates(&rows, &["name"]).to_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].row, Some(3));
    }

    #[test]
    fn reference_values_grouped_by_row() {
        let rows = vec![
            row(&[("customer_id", json!("Acme"))]),
            row(&[("customer_id", json!(" Acme "))]),
            row(&[("customer_id", json!("Globex"))]),
            row(&[]),
        ];
        let values = collect_reference_values(&rows, "customer_id");
        assert_eq!(values["Acme"], vec![1, 2]);
        assert_eq!(values["Globex"], vec![3]);
        assert_eq!(values.len(), 2);
    }
}
