//! Internal helpers for input normalization and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation so the engine enforces consistent invariants.

use chrono::NaiveDate;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Trim a required name, rejecting empty values.
pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return Err(EngineError::Validation(format!(
            "{label} must not be empty"
        )));
    }
    Ok(collapsed)
}

/// Comparison key for names: accents and case do not make two names distinct.
pub(crate) fn normalize_name_key(value: &str) -> String {
    let stripped: String = value
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Accepts `#RGB` or `#RRGGBB` and returns the lowercase form.
pub(crate) fn normalize_color(value: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    let valid = trimmed
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()));
    if !valid {
        return Err(EngineError::Validation(format!(
            "invalid color '{trimmed}': expected #RGB or #RRGGBB"
        )));
    }
    Ok(trimmed.to_ascii_lowercase())
}

/// Parses a calendar date in ISO (`2023-10-01`) or Brazilian (`01/10/2023`) form.
pub(crate) fn parse_date(value: &str) -> ResultEngine<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y"))
        .map_err(|_| EngineError::Validation(format!("invalid date '{trimmed}'")))
}

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::KeyNotFound(format!("{label} not exists")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_key_ignores_accents_case_and_spacing() {
        assert_eq!(normalize_name_key("  Alimentação   Fora "), "alimentacao fora");
        assert_eq!(normalize_name_key("CAFÉ"), normalize_name_key("cafe"));
    }

    #[test]
    fn required_name_collapses_whitespace() {
        assert_eq!(
            normalize_required_name("  Housing   costs ", "tag group name").unwrap(),
            "Housing costs"
        );
        assert!(normalize_required_name("   ", "tag name").is_err());
    }

    #[test]
    fn colors_are_validated_and_lowercased() {
        assert_eq!(normalize_color("#FFaa00").unwrap(), "#ffaa00");
        assert_eq!(normalize_color("#abc").unwrap(), "#abc");
        assert!(normalize_color("ffaa00").is_err());
        assert!(normalize_color("#ggg").is_err());
        assert!(normalize_color("#abcd").is_err());
    }

    #[test]
    fn dates_accept_iso_and_brazilian_forms() {
        let expected = NaiveDate::from_ymd_opt(2023, 10, 1).unwrap();
        assert_eq!(parse_date("2023-10-01").unwrap(), expected);
        assert_eq!(parse_date("01/10/2023").unwrap(), expected);
        assert!(parse_date("2023-13-01").is_err());
        assert!(parse_date("yesterday").is_err());
    }
}
