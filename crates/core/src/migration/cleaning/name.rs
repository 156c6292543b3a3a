//! Personal and organisation name normalizer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Words kept lowercase in title case unless they start the name.
pub const CONNECTOR_WORDS: &[&str] = &[
    "and", "or", "the", "of", "in", "on", "at", "to", "for", "a", "an", "by", "with", "from",
];

/// Words always rendered uppercase in title case.
pub const UPPERCASE_WORDS: &[&str] = &[
    "LLC", "LTD", "PLC", "INC", "NG", "USA", "UK", "CEO", "CFO", "CTO", "HR", "IT", "II", "III",
    "IV",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameCase {
    Title,
    Upper,
    Lower,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameConfig {
    pub case: NameCase,
}

impl Default for NameConfig {
    fn default() -> Self {
        Self {
            case: NameCase::Title,
        }
    }
}

pub(super) fn clean(value: &Value, config: &NameConfig) -> (Value, Vec<String>) {
    let Value::String(raw) = value else {
        return (value.clone(), vec!["Name value is not text".to_string()]);
    };
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let cased = match config.case {
        NameCase::Title => title_case(&collapsed),
        NameCase::Upper => collapsed.to_uppercase(),
        NameCase::Lower => collapsed.to_lowercase(),
        NameCase::None => collapsed,
    };
    (Value::String(cased), Vec::new())
}

/// Title-case a whitespace-normalized name.
pub fn title_case(s: &str) -> String {
    s.split(' ')
        .enumerate()
        .map(|(i, word)| title_word(word, i == 0))
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_word(word: &str, first: bool) -> String {
    let bare = word.trim_end_matches(['.', ',']);
    let upper = bare.to_uppercase();
    if UPPERCASE_WORDS.contains(&upper.as_str()) {
        return format!("{upper}{}", &word[bare.len()..]);
    }
    let lower = word.to_lowercase();
    if !first && CONNECTOR_WORDS.contains(&lower.as_str()) {
        return lower;
    }
    capitalize_segments(&lower)
}

/// Uppercase the first letter of the word and of every segment following a
/// hyphen or apostrophe (`o'brien` → `O'Brien`, `mary-jane` → `Mary-Jane`).
fn capitalize_segments(lower: &str) -> String {
    let mut out = String::with_capacity(lower.len());
    let mut at_start = true;
    for c in lower.chars() {
        if at_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            at_start = false;
        } else {
            out.push(c);
            if c == '-' || c == '\'' {
                at_start = true;
            }
        }
    }
    out
}
