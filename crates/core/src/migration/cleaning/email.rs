//! Email normalizer. Never blocks: malformed addresses only warn.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Permissive shape check: something@something.tld, no whitespace.
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

/// Common provider-domain typos and their corrections.
pub const DOMAIN_TYPOS: &[(&str, &str)] = &[
    ("gmial.com", "gmail.com"),
    ("gmai.com", "gmail.com"),
    ("gmal.com", "gmail.com"),
    ("gamil.com", "gmail.com"),
    ("gmail.co", "gmail.com"),
    ("gmail.con", "gmail.com"),
    ("yahooo.com", "yahoo.com"),
    ("yaho.com", "yahoo.com"),
    ("yahoo.con", "yahoo.com"),
    ("hotmal.com", "hotmail.com"),
    ("hotmial.com", "hotmail.com"),
    ("hotmail.con", "hotmail.com"),
    ("outlok.com", "outlook.com"),
    ("outloo.com", "outlook.com"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub lowercase: bool,
    pub fix_typos: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            fix_typos: true,
        }
    }
}

/// Whether a string passes the permissive email check.
pub fn is_valid_email(s: &str) -> bool {
    EMAIL_RE.is_match(s)
}

pub(super) fn clean(value: &Value, config: &EmailConfig) -> (Value, Vec<String>) {
    let Value::String(raw) = value else {
        return (value.clone(), vec!["Email value is not text".to_string()]);
    };

    let mut email = raw.trim().to_string();
    if config.lowercase {
        email = email.to_lowercase();
    }

    let mut warnings = Vec::new();
    if config.fix_typos {
        if let Some((local, domain)) = email.rsplit_once('@') {
            let lower = domain.to_lowercase();
            if let Some((_, fixed)) = DOMAIN_TYPOS.iter().find(|(typo, _)| *typo == lower) {
                warnings.push(format!("Corrected email domain '{domain}' to '{fixed}'"));
                email = format!("{local}@{fixed}");
            }
        }
    }

    if !is_valid_email(&email) {
        warnings.push(format!("Invalid email format: '{email}'"));
    }

    (Value::String(email), warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trims_and_lowercases() {
        let (value, warnings) = clean(&json!("  Alice@Example.COM "), &EmailConfig::default());
        assert_eq!(value, json!("alice@example.com"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn lowercase_can_be_disabled() {
        let config = EmailConfig {
            lowercase: false,
            fix_typos: true,
        };
        let (value, _) = clean(&json!("Alice@Example.com"), &config);
        assert_eq!(value, json!("Alice@Example.com"));
    }

    #[test]
    fn fixes_known_typos_with_warning() {
        let (value, warnings) = clean(&json!("ada@gmial.com"), &EmailConfig::default());
        assert_eq!(value, json!("ada@gmail.com"));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("gmial.com"));
    }

    #[test]
    fn typo_fix_can_be_disabled() {
        let config = EmailConfig {
            lowercase: true,
            fix_typos: false,
        };
        let (value, warnings) = clean(&json!("ada@gmial.com"), &config);
        assert_eq!(value, json!("ada@gmial.com"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn malformed_address_warns_but_is_kept() {
        let (value, warnings) = clean(&json!("bob@@x"), &EmailConfig::default());
        assert_eq!(value, json!("bob@@x"));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("Invalid email format"));
    }

    #[test]
    fn validity_check() {
        assert!(is_valid_email("a.b+c@sub.example.ng"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("two@@signs.com"));
        assert!(!is_valid_email("space in@example.com"));
        assert!(!is_valid_email("nodot@example"));
    }
}
