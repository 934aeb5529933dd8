//! Input validation for staged measurements
//!
//! Entry constructors call these before computing any amount, so an entry that
//! exists always carries non-negative, finite quantities.

use rust_decimal::Decimal;

use crate::error::{StagingError, StagingResult};

/// Convert a floating point input into a decimal quantity
pub fn decimal_from_input(value: f64, field: &'static str) -> StagingResult<Decimal> {
    if !value.is_finite() {
        return Err(StagingError::NonFinite { field });
    }
    Decimal::try_from(value).map_err(|_| StagingError::AmountOutOfRange { field })
}

/// Validate that a quantity is zero or more
pub fn validate_non_negative(value: Decimal, field: &'static str) -> StagingResult<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(StagingError::Negative { field });
    }
    Ok(())
}

/// Validate that a conversion factor is strictly positive
pub fn validate_factor(factor: Decimal) -> StagingResult<()> {
    if factor <= Decimal::ZERO {
        return Err(StagingError::NotPositive { field: "factor" });
    }
    Ok(())
}

/// Validate that a unit was selected, returning its normalized name
pub fn validate_unit(unit: &str) -> StagingResult<String> {
    let normalized = crate::models::normalize_unit(unit);
    if normalized.is_empty() {
        return Err(StagingError::MissingUnit);
    }
    Ok(normalized)
}

/// Check whether a product tare weight is usable for tare entries
pub fn is_usable_tare_weight(tare_weight: Option<Decimal>) -> bool {
    matches!(tare_weight, Some(weight) if weight > Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_decimal_from_input_finite() {
        assert_eq!(decimal_from_input(2.5, "gross").unwrap(), dec("2.5"));
        assert_eq!(decimal_from_input(0.0, "gross").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_decimal_from_input_rejects_non_finite() {
        assert_eq!(
            decimal_from_input(f64::NAN, "gross"),
            Err(StagingError::NonFinite { field: "gross" })
        );
        assert!(decimal_from_input(f64::INFINITY, "gross").is_err());
        assert!(decimal_from_input(f64::NEG_INFINITY, "gross").is_err());
    }

    #[test]
    fn test_decimal_from_input_rejects_huge_values() {
        assert_eq!(
            decimal_from_input(1e30, "gross"),
            Err(StagingError::AmountOutOfRange { field: "gross" })
        );
        assert!(decimal_from_input(1e15, "gross").is_ok());
    }

    #[test]
    fn test_validate_non_negative() {
        assert!(validate_non_negative(dec("0"), "amount").is_ok());
        assert!(validate_non_negative(dec("-0.0"), "amount").is_ok());
        assert!(validate_non_negative(dec("12.5"), "amount").is_ok());
        assert_eq!(
            validate_non_negative(dec("-1"), "amount"),
            Err(StagingError::Negative { field: "amount" })
        );
    }

    #[test]
    fn test_validate_factor() {
        assert!(validate_factor(dec("453.592")).is_ok());
        assert!(validate_factor(Decimal::ZERO).is_err());
        assert!(validate_factor(dec("-2")).is_err());
    }

    #[test]
    fn test_validate_unit() {
        assert_eq!(validate_unit("  Lb ").unwrap(), "lb");
        assert_eq!(validate_unit("   "), Err(StagingError::MissingUnit));
    }

    #[test]
    fn test_usable_tare_weight() {
        assert!(is_usable_tare_weight(Some(dec("50"))));
        assert!(!is_usable_tare_weight(Some(Decimal::ZERO)));
        assert!(!is_usable_tare_weight(None));
    }
}
