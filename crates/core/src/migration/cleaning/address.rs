//! Address / state normalizer.
//!
//! Short free-text values are matched against Nigerian states (and common
//! aliases) and rewritten to the canonical state name. Longer values are
//! treated as street addresses and only whitespace-normalized.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The 36 states plus the Federal Capital Territory.
pub const NIGERIAN_STATES: &[&str] = &[
    "Abia",
    "Adamawa",
    "Akwa Ibom",
    "Anambra",
    "Bauchi",
    "Bayelsa",
    "Benue",
    "Borno",
    "Cross River",
    "Delta",
    "Ebonyi",
    "Edo",
    "Ekiti",
    "Enugu",
    "FCT",
    "Gombe",
    "Imo",
    "Jigawa",
    "Kaduna",
    "Kano",
    "Katsina",
    "Kebbi",
    "Kogi",
    "Kwara",
    "Lagos",
    "Nasarawa",
    "Niger",
    "Ogun",
    "Ondo",
    "Osun",
    "Oyo",
    "Plateau",
    "Rivers",
    "Sokoto",
    "Taraba",
    "Yobe",
    "Zamfara",
];

/// Lowercased alias → canonical state.
pub const STATE_ALIASES: &[(&str, &str)] = &[
    ("abuja", "FCT"),
    ("f.c.t", "FCT"),
    ("f.c.t.", "FCT"),
    ("federal capital territory", "FCT"),
    ("fct abuja", "FCT"),
    ("abuja fct", "FCT"),
    ("akwa-ibom", "Akwa Ibom"),
    ("akwaibom", "Akwa Ibom"),
    ("cross-river", "Cross River"),
    ("crossriver", "Cross River"),
    ("nassarawa", "Nasarawa"),
    ("lagos state", "Lagos"),
    ("rivers state", "Rivers"),
    ("kano state", "Kano"),
    ("oyo state", "Oyo"),
    ("ph", "Rivers"),
    ("port harcourt", "Rivers"),
];

/// Values longer than this are never treated as a state.
const MAX_STATE_CHARS: usize = 30;
/// Values with more words than this are never treated as a state.
const MAX_STATE_WORDS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressConfig {
    pub normalize_states: bool,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            normalize_states: true,
        }
    }
}

/// Resolve a state name or alias to its canonical spelling.
pub fn canonical_state(s: &str) -> Option<&'static str> {
    let key = s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    NIGERIAN_STATES
        .iter()
        .copied()
        .find(|state| state.to_lowercase() == key)
        .or_else(|| {
            STATE_ALIASES
                .iter()
                .find(|(alias, _)| *alias == key)
                .map(|(_, state)| *state)
        })
}

fn looks_like_state(s: &str) -> bool {
    s.chars().count() <= MAX_STATE_CHARS
        && s.split_whitespace().count() <= MAX_STATE_WORDS
        && !s.chars().any(|c| c.is_ascii_digit())
}

pub(super) fn clean(value: &Value, config: &AddressConfig) -> (Value, Vec<String>) {
    let Value::String(raw) = value else {
        return (value.clone(), vec!["Address value is not text".to_string()]);
    };
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    if !config.normalize_states || !looks_like_state(&collapsed) {
        return (Value::String(collapsed), Vec::new());
    }

    match canonical_state(&collapsed) {
        Some(state) => (Value::String(state.to_string()), Vec::new()),
        None => {
            let warning = format!("'{collapsed}' is not a recognized Nigerian state");
            (Value::String(collapsed), vec![warning])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clean_default(raw: &str) -> (Value, Vec<String>) {
        clean(&json!(raw), &AddressConfig::default())
    }

    #[test]
    fn table_has_all_states_and_fct() {
        assert_eq!(NIGERIAN_STATES.len(), 37);
    }

    #[test]
    fn canonicalizes_states_case_insensitively() {
        assert_eq!(clean_default("lagos").0, json!("Lagos"));
        assert_eq!(clean_default("  AKWA   ibom ").0, json!("Akwa Ibom"));
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(clean_default("Abuja").0, json!("FCT"));
        assert_eq!(clean_default("Lagos State").0, json!("Lagos"));
        assert_eq!(clean_default("Nassarawa").0, json!("Nasarawa"));
    }

    #[test]
    fn unknown_short_value_warns() {
        let (value, warnings) = clean_default("Gotham");
        assert_eq!(value, json!("Gotham"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn street_addresses_pass_through() {
        let (value, warnings) = clean_default("12  Broad Street,  Lagos Island");
        assert_eq!(value, json!("12 Broad Street, Lagos Island"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn normalization_can_be_disabled() {
        let config = AddressConfig {
            normalize_states: false,
        };
        let (value, warnings) = clean(&json!("abuja"), &config);
        assert_eq!(value, json!("abuja"));
        assert!(warnings.is_empty());
    }
}
