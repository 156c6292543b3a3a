//! Date / datetime normalizer.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::scalar_text;

/// Input formats tried in order before the ISO-8601 fallback.
pub const DEFAULT_INPUT_FORMATS: &[&str] = &[
    "%d/%m/%Y",
    "%Y-%m-%d",
    "%d-%m-%Y",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%Y/%m/%d",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
];

const ISO_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateConfig {
    pub input_formats: Vec<String>,
    pub output_format: String,
    pub datetime_output_format: String,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            input_formats: DEFAULT_INPUT_FORMATS.iter().map(|s| s.to_string()).collect(),
            output_format: "%Y-%m-%d".to_string(),
            datetime_output_format: "%Y-%m-%dT%H:%M:%S".to_string(),
        }
    }
}

/// A successfully parsed calendar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedDate {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl ParsedDate {
    pub fn date(self) -> NaiveDate {
        match self {
            Self::Date(d) => d,
            Self::DateTime(dt) => dt.date(),
        }
    }

    /// Render with the configured output formats.
    pub fn render(self, config: &DateConfig) -> String {
        match self {
            Self::Date(d) => d.format(&config.output_format).to_string(),
            Self::DateTime(dt) => dt.format(&config.datetime_output_format).to_string(),
        }
    }
}

/// Parse `raw` with each format in turn, then fall back to ISO-8601.
pub fn parse_date<S: AsRef<str>>(raw: &str, formats: &[S]) -> Option<ParsedDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for format in formats {
        let format = format.as_ref();
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ParsedDate::DateTime(dt));
        }
        if let Ok(d) = NaiveDate::parse_from_str(raw, format) {
            return Some(ParsedDate::Date(d));
        }
    }

    parse_iso(raw)
}

fn parse_iso(raw: &str) -> Option<ParsedDate> {
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(ParsedDate::Date(d));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(ParsedDate::DateTime(dt.naive_utc()));
    }
    ISO_DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .map(ParsedDate::DateTime)
}

pub(super) fn clean(value: &Value, config: &DateConfig) -> (Value, Vec<String>) {
    let Some(raw) = scalar_text(value) else {
        return (Value::Null, vec!["Date value is not text".to_string()]);
    };
    match parse_date(&raw, &config.input_formats) {
        Some(parsed) => (Value::String(parsed.render(config)), Vec::new()),
        None => (
            Value::Null,
            vec![format!("Could not parse date '{}'", raw.trim())],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clean_default(raw: &str) -> (Value, Vec<String>) {
        clean(&json!(raw), &DateConfig::default())
    }

    #[test]
    fn day_first_is_preferred() {
        assert_eq!(clean_default("31/12/2024").0, json!("2024-12-31"));
        assert_eq!(clean_default("01/02/2024").0, json!("2024-02-01"));
    }

    #[test]
    fn month_first_when_day_first_impossible() {
        assert_eq!(clean_default("12/31/2024").0, json!("2024-12-31"));
    }

    #[test]
    fn named_months() {
        assert_eq!(clean_default("5 Mar 2023").0, json!("2023-03-05"));
        assert_eq!(clean_default("March 5, 2023").0, json!("2023-03-05"));
        assert_eq!(clean_default("05.03.2023").0, json!("2023-03-05"));
    }

    #[test]
    fn iso_fallback_handles_datetimes() {
        assert_eq!(
            clean_default("2024-06-01T08:30:00Z").0,
            json!("2024-06-01T08:30:00")
        );
        assert_eq!(
            clean_default("2024-06-01 08:30:15.250").0,
            json!("2024-06-01T08:30:15")
        );
    }

    #[test]
    fn configured_formats_win_over_iso() {
        let config = DateConfig {
            input_formats: vec!["%Y-%d-%m".into()],
            ..Default::default()
        };
        let (value, _) = clean(&json!("2024-05-03"), &config);
        assert_eq!(value, json!("2024-03-05"));
    }

    #[test]
    fn custom_output_format() {
        let config = DateConfig {
            output_format: "%d %B %Y".into(),
            ..Default::default()
        };
        assert_eq!(clean(&json!("2024-12-31"), &config).0, json!("31 December 2024"));
    }

    #[test]
    fn unparseable_is_null_with_warning() {
        let (value, warnings) = clean_default("sometime next week");
        assert_eq!(value, Value::Null);
        assert_eq!(warnings.len(), 1);
        assert!(clean_default("31/02/2024").0.is_null());
    }
}
