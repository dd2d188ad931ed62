//! # Validation Module
//!
//! Input validation for values that come from editors and configuration
//! files rather than from code.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Where Bad Values Are Caught                        │
//! │                                                                         │
//! │  Rule table (engine.toml / host)                                        │
//! │  └── validate_discount_percent → rule deactivated, warning logged       │
//! │                                                                         │
//! │  Discount configuration                                                 │
//! │  └── clamp_lookback_months → silently forced into [1, 24]               │
//! │                                                                         │
//! │  Cart enrollments                                                       │
//! │  └── validate_entity_id / validate_unit_price → line skipped            │
//! │                                                                         │
//! │  Nothing here panics and nothing blocks a purchase.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_LOOKBACK_MONTHS, MIN_LOOKBACK_MONTHS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a discount percentage.
///
/// ## Rules
/// - Must be finite
/// - Must be `>= 0` and strictly `< 100` (a 100% discount is a free product,
///   which the shop models differently)
/// - Must stay below 100 after rounding to basis points, since that is the
///   rate allocations are computed with
///
/// ## Example
/// ```rust
/// use clubhouse_core::validation::validate_discount_percent;
///
/// assert!(validate_discount_percent(33.33).is_ok());
/// assert!(validate_discount_percent(0.0).is_ok());
/// assert!(validate_discount_percent(100.0).is_err());
/// assert!(validate_discount_percent(99.996).is_err());
/// assert!(validate_discount_percent(-1.0).is_err());
/// ```
pub fn validate_discount_percent(pct: f64) -> ValidationResult<()> {
    let rounds_to_full = (pct * 100.0).round() >= 10_000.0;
    if !pct.is_finite() || pct < 0.0 || pct >= 100.0 || rounds_to_full {
        return Err(ValidationError::PercentOutOfRange {
            field: "rate_percent".to_string(),
            min: 0.0,
            max: 100.0,
            value: pct,
        });
    }

    Ok(())
}

/// Forces a lookback window into `[MIN_LOOKBACK_MONTHS, MAX_LOOKBACK_MONTHS]`.
///
/// ## Example
/// ```rust
/// use clubhouse_core::validation::clamp_lookback_months;
///
/// assert_eq!(clamp_lookback_months(0), 1);
/// assert_eq!(clamp_lookback_months(6), 6);
/// assert_eq!(clamp_lookback_months(60), 24);
/// ```
pub fn clamp_lookback_months(months: i64) -> u32 {
    months.clamp(MIN_LOOKBACK_MONTHS as i64, MAX_LOOKBACK_MONTHS as i64) as u32
}

/// Validates an entity identifier (course, child, series, order).
pub fn validate_entity_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a unit price.
///
/// ## Rules
/// - Must be non-negative (zero is allowed for free trial sessions)
pub fn validate_unit_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::NegativeAmount {
            field: "unit_price".to_string(),
            cents: price.cents(),
        });
    }

    Ok(())
}

/// Validates the scheduler's scan safety factor.
///
/// ## Rules
/// - At least 7: one occurrence of a weekday can be up to seven days away
/// - At most 100: anything larger no longer guards against runaway input
pub fn validate_safety_factor(factor: u32) -> ValidationResult<()> {
    if !(7..=100).contains(&factor) {
        return Err(ValidationError::OutOfRange {
            field: "safety_factor".to_string(),
            min: 7,
            max: 100,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
