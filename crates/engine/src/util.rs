//! Internal helpers for validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use serde::{Deserialize, Deserializer};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{EngineError, Money, ResultEngine};

pub(crate) fn ensure_positive(amount: Money) -> ResultEngine<()> {
    if !amount.is_positive() {
        return Err(EngineError::InvalidAmount("amount must be > 0".to_string()));
    }
    if amount > Money::MAX {
        return Err(EngineError::InvalidAmount(format!(
            "amount must not exceed {}",
            Money::MAX
        )));
    }
    Ok(())
}

pub(crate) fn ensure_target(target: Money) -> ResultEngine<()> {
    if !target.is_positive() || target > Money::MAX {
        return Err(EngineError::InvalidAmount(format!(
            "goal target must be > 0 and at most {}",
            Money::MAX
        )));
    }
    Ok(())
}

/// Trim and collapse inner whitespace; reject empty names.
pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let display = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if display.is_empty() {
        return Err(EngineError::InvalidName(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(display)
}

/// Comparison key for goal names: NFKC, lowercase, single spaces.
pub(crate) fn name_key(value: &str) -> String {
    let folded: String = value.nfkc().flat_map(char::to_lowercase).collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::KeyNotFound(format!("invalid {label} id")))
}

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn true_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

pub(crate) fn string_or_null<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn non_empty_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_key_folds_case_and_spacing() {
        assert_eq!(name_key("  New   Laptop "), "new laptop");
        assert_eq!(name_key("ＬＡＰＴＯＰ"), "laptop");
        assert_eq!(name_key("Vacanze"), name_key("VACANZE"));
    }

    #[test]
    fn required_name_rejects_blank() {
        assert!(normalize_required_name("   ", "goal").is_err());
        assert_eq!(normalize_required_name(" Car  fund ", "goal").unwrap(), "Car fund");
    }
}
