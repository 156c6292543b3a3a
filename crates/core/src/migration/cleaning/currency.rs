//! Currency normalizer. All arithmetic is exact decimal.

use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::scalar_text;

pub const DEFAULT_CURRENCY_SYMBOLS: &[&str] = &["₦", "NGN", "$", "USD", "€", "EUR", "£", "GBP"];

/// Most significant digits accepted in one amount.
pub const MAX_AMOUNT_DIGITS: usize = 38;

/// Upper bound on configured rounding precision.
pub const MAX_DECIMAL_PLACES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    pub decimal_places: u32,
    /// Symbols and ISO codes stripped before parsing. Matched
    /// case-insensitively.
    pub symbols: Vec<String>,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            decimal_places: 2,
            symbols: DEFAULT_CURRENCY_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Parse a money string into an unrounded decimal.
///
/// Strips configured symbols, whitespace and `,` thousands separators.
/// `(1,000.50)` reads as `-1000.50`. Only plain decimal notation of at most
/// [`MAX_AMOUNT_DIGITS`] digits is accepted; exponents are rejected.
pub fn parse_currency(raw: &str, config: &CurrencyConfig) -> Option<BigDecimal> {
    let mut text = raw.trim().to_uppercase();

    let mut symbols: Vec<String> = config.symbols.iter().map(|s| s.to_uppercase()).collect();
    symbols.sort_by_key(|s| std::cmp::Reverse(s.len()));
    for symbol in symbols.iter().filter(|s| !s.is_empty()) {
        text = text.replace(symbol.as_str(), "");
    }
    text.retain(|c| !c.is_whitespace() && c != ',');

    let negated = text.starts_with('(') && text.ends_with(')');
    if negated {
        text = text[1..text.len() - 1].to_string();
    }
    if !is_plain_decimal(&text) {
        return None;
    }

    let amount = BigDecimal::from_str(&text).ok()?;
    Some(if negated { -amount } else { amount })
}

fn is_plain_decimal(text: &str) -> bool {
    let unsigned = text
        .strip_prefix('-')
        .or_else(|| text.strip_prefix('+'))
        .unwrap_or(text);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let digits = whole.len() + fraction.len();
    digits > 0
        && digits <= MAX_AMOUNT_DIGITS
        && whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit())
}

/// Round half-up to `places` decimal places, capped at [`MAX_DECIMAL_PLACES`].
pub fn round_amount(amount: &BigDecimal, places: u32) -> BigDecimal {
    let places = places.min(MAX_DECIMAL_PLACES);
    amount.with_scale_round(i64::from(places), RoundingMode::HalfUp)
}

pub(super) fn clean(value: &Value, config: &CurrencyConfig) -> (Value, Vec<String>) {
    let Some(raw) = scalar_text(value) else {
        return (Value::Null, vec!["Currency value is not numeric".to_string()]);
    };
    let Some(amount) = parse_currency(&raw, config) else {
        return (
            Value::Null,
            vec![format!("Could not parse currency value '{}'", raw.trim())],
        );
    };

    let rounded = round_amount(&amount, config.decimal_places);
    let mut warnings = Vec::new();
    if rounded < BigDecimal::from(0) {
        warnings.push(format!("Negative amount: {rounded}"));
    }
    (Value::String(rounded.to_string()), warnings)
}
