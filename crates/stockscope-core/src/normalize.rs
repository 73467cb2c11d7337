//! String-to-value coercion shared by the provider normalization functions.
//!
//! Providers report missing values with placeholder strings (`"None"`, `"-"`,
//! `"N/A"`, ...). Every helper here maps those placeholders to `None`, so an
//! unknown value has exactly one representation downstream.

use serde_json::Value;

const SENTINELS: [&str; 8] = ["", "none", "null", "-", "--", "n/a", "na", "unknown"];

/// True when `raw` is a provider placeholder for "no value".
pub fn is_unknown_sentinel(raw: &str) -> bool {
    let trimmed = raw.trim();
    SENTINELS
        .iter()
        .any(|sentinel| sentinel.eq_ignore_ascii_case(trimmed))
}

/// Trimmed text, or `None` for sentinels.
pub fn parse_text(raw: &str) -> Option<String> {
    if is_unknown_sentinel(raw) {
        return None;
    }
    Some(raw.trim().to_owned())
}

/// Parse a provider number.
///
/// Accepts thousands separators, a leading `$` or `+`, a trailing `%`
/// (`"1.42%"` is `1.42`) and abbreviated magnitudes (`"2.7T"`, `"350M"`).
pub fn parse_number(raw: &str) -> Option<f64> {
    if is_unknown_sentinel(raw) {
        return None;
    }

    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|ch| !matches!(ch, ',' | '$' | '+' | ' ' | '_'))
        .collect();
    let cleaned = cleaned.strip_suffix('%').unwrap_or(&cleaned);

    let (digits, scale) = match cleaned.chars().last() {
        Some(suffix) if suffix.is_ascii_alphabetic() => {
            let scale = magnitude(suffix)?;
            (&cleaned[..cleaned.len() - 1], scale)
        }
        _ => (cleaned, 1.0),
    };

    let value = digits.parse::<f64>().ok()? * scale;
    value.is_finite().then_some(value)
}

/// Number from a JSON value that may be a number or a numeric string.
pub fn number_from_json(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|value| value.is_finite()),
        Value::String(raw) => parse_number(raw),
        _ => None,
    }
}

/// Text from a JSON string value, with sentinels mapped to `None`.
pub fn text_from_json(value: &Value) -> Option<String> {
    value.as_str().and_then(parse_text)
}

fn magnitude(suffix: char) -> Option<f64> {
    match suffix.to_ascii_uppercase() {
        'K' => Some(1e3),
        'M' => Some(1e6),
        'B' => Some(1e9),
        'T' => Some(1e12),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sentinels_are_unknown() {
        for raw in ["None", "-", "", "N/A", "unknown", "  null "] {
            assert!(is_unknown_sentinel(raw), "{raw:?} should be a sentinel");
            assert_eq!(parse_number(raw), None);
            assert_eq!(parse_text(raw), None);
        }
        assert!(!is_unknown_sentinel("0"));
    }

    #[test]
    fn strips_percent_and_separators() {
        assert_eq!(parse_number("1.42%"), Some(1.42));
        assert_eq!(parse_number("-0.35%"), Some(-0.35));
        assert_eq!(parse_number("$1,234.50"), Some(1234.5));
    }

    #[test]
    fn expands_abbreviated_magnitudes() {
        assert_eq!(parse_number("2.7T"), Some(2.7e12));
        assert_eq!(parse_number("350m"), Some(350e6));
        assert_eq!(parse_number("12X"), None);
    }

    #[test]
    fn json_numbers_and_strings_normalize_alike() {
        assert_eq!(number_from_json(&json!(28.5)), Some(28.5));
        assert_eq!(number_from_json(&json!("28.5")), Some(28.5));
        assert_eq!(number_from_json(&json!("None")), None);
        assert_eq!(number_from_json(&Value::Null), None);
        assert_eq!(text_from_json(&json!(" Technology ")), Some(String::from("Technology")));
    }
}
