//! Phone number normalizer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::scalar_text;

/// Country code whose numbers get length and network-prefix checks.
pub const NIGERIA_COUNTRY_CODE: &str = "234";

/// Total digits of a Nigerian number including the country code.
pub const NIGERIA_FULL_LENGTH: usize = 13;

/// Mobile network prefixes (the three digits after `234`).
pub const NIGERIA_MOBILE_PREFIXES: &[&str] = &[
    // MTN
    "703", "706", "803", "806", "810", "813", "814", "816", "903", "906", "913", "916",
    // Airtel
    "701", "708", "802", "808", "812", "901", "902", "904", "907", "912",
    // Glo
    "705", "805", "807", "811", "815", "905", "915",
    // 9mobile
    "809", "817", "818", "908", "909",
    // Others (Ntel, Smile, Visafone)
    "804", "702", "704", "707", "709",
];

/// Output shape for cleaned phone numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhoneFormat {
    /// `+2348031234567`
    E164,
    /// `08031234567`
    Local,
    /// `+234 803 123 4567`
    International,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneConfig {
    /// Digits only, without `+`.
    pub country_code: String,
    pub format: PhoneFormat,
}

impl Default for PhoneConfig {
    fn default() -> Self {
        Self {
            country_code: NIGERIA_COUNTRY_CODE.to_string(),
            format: PhoneFormat::E164,
        }
    }
}

pub(super) fn clean(value: &Value, config: &PhoneConfig) -> (Value, Vec<String>) {
    let Some(raw) = scalar_text(value) else {
        return (value.clone(), vec!["Phone value is not text".to_string()]);
    };
    let raw = raw.trim();
    let explicit_international = raw.starts_with('+') || raw.starts_with("00");
    let mut digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if raw.starts_with("00") {
        digits.drain(..2);
    }

    if digits.is_empty() {
        return (
            Value::Null,
            vec![format!("Phone number '{raw}' contains no digits")],
        );
    }

    let country_code: String = config
        .country_code
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    let full = to_international_digits(&digits, &country_code, explicit_international);

    let mut warnings = Vec::new();
    if full.starts_with(NIGERIA_COUNTRY_CODE) {
        warnings.extend(check_nigerian(&full));
    }

    (Value::String(format_number(&full, &country_code, config.format)), warnings)
}

/// Expand a digit string to country-code-prefixed form.
fn to_international_digits(digits: &str, country_code: &str, explicit: bool) -> String {
    if explicit || country_code.is_empty() {
        return digits.to_string();
    }
    if let Some(rest) = digits.strip_prefix('0') {
        return format!("{country_code}{rest}");
    }
    if digits.starts_with(country_code) {
        return digits.to_string();
    }
    if country_code == NIGERIA_COUNTRY_CODE && digits.len() == NIGERIA_FULL_LENGTH - 3 {
        return format!("{country_code}{digits}");
    }
    digits.to_string()
}

fn check_nigerian(full: &str) -> Vec<String> {
    if full.len() != NIGERIA_FULL_LENGTH {
        return vec![format!(
            "Nigerian phone numbers have {NIGERIA_FULL_LENGTH} digits including country code, got {}",
            full.len()
        )];
    }
    let prefix = &full[3..6];
    if NIGERIA_MOBILE_PREFIXES.contains(&prefix) {
        Vec::new()
    } else {
        vec![format!("Unrecognized Nigerian mobile prefix 0{prefix}")]
    }
}

fn format_number(full: &str, country_code: &str, format: PhoneFormat) -> String {
    let local_part = (!country_code.is_empty())
        .then(|| full.strip_prefix(country_code))
        .flatten();

    match (format, local_part) {
        (PhoneFormat::E164, _) => format!("+{full}"),
        (PhoneFormat::Local, Some(rest)) => format!("0{rest}"),
        (PhoneFormat::Local, None) => format!("+{full}"),
        (PhoneFormat::International, Some(rest)) if rest.len() > 6 => {
            format!("+{country_code} {} {} {}", &rest[..3], &rest[3..6], &rest[6..])
        }
        (PhoneFormat::International, _) => format!("+{full}"),
    }
}
