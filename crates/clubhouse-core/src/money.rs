//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  A tournament day costs CHF 30.00, second day 33.33% off:               │
//! │    30.0 * 0.3333 = 9.999000000000001                                    │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Rappen (cents) + basis point rates               │
//! │    3000 * 3333 = 9_999_000  →  (9_999_000 + 5000) / 10000 = 1000        │
//! │    Allocation: -CHF 10.00, net price CHF 20.00                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use clubhouse_core::money::Money;
//!
//! let session = Money::from_cents(4500); // CHF 45.00 per session
//! let prorated = session * 7_i64;        // 7 sessions left
//! assert_eq!(prorated.cents(), 31500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};
use ts_rs::TS;

use crate::types::DiscountRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (Rappen for CHF).
///
/// ## Design Decisions
/// - **i64 (signed)**: discount allocations are negative amounts
/// - **Single field tuple struct**: zero-cost abstraction over i64
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  base price ─┐                                                          │
/// │              ├──► PricingEngine ──► Enrollment.unit_price               │
/// │  per-session ┘                            │                             │
/// │                                           ▼                             │
/// │                             DiscountEngine ──► DiscountAllocation.amount│
/// │                                           │                             │
/// │                                           ▼                             │
/// │                              net price = unit_price + allocation        │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use clubhouse_core::money::Money;
    ///
    /// let price = Money::from_cents(60000); // CHF 600.00
    /// assert_eq!(price.cents(), 60000);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (francs) portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns the value, or zero if it is negative.
    #[inline]
    pub const fn clamp_non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Returns `rate` percent of this amount, rounded half-up to the cent.
    ///
    /// Half-up means away from zero: 0.5 Rappen always rounds to 1.
    ///
    /// ## Example
    /// ```rust
    /// use clubhouse_core::money::Money;
    /// use clubhouse_core::types::DiscountRate;
    ///
    /// let day = Money::from_cents(3000);
    /// let off = day.percentage(DiscountRate::from_bps(3333));
    /// assert_eq!(off.cents(), 1000); // 9.999 → 10.00
    /// ```
    pub fn percentage(&self, rate: DiscountRate) -> Money {
        // i128 so large catalog prices times 10_000 never overflow
        let product = self.0 as i128 * rate.bps() as i128;
        let rounded = if product >= 0 {
            (product + 5000) / 10000
        } else {
            (product - 5000) / 10000
        };
        Money::from_cents(rounded as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows the amount in Swiss francs.
///
/// ## Note
/// For logs and allocation notes. The shop formats prices for display itself.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}CHF {}.{:02}",
            sign,
            self.major().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by a session count.
impl Mul<u32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: u32) -> Self {
        Money(self.0 * qty as i64)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(60000)), "CHF 600.00");
        assert_eq!(format!("{}", Money::from_cents(-11000)), "-CHF 110.00");
        assert_eq!(format!("{}", Money::from_cents(5)), "CHF 0.05");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((-a).cents(), -1000);
        assert_eq!((a * 3_u32).cents(), 3000);
        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_percentage_sibling_rates() {
        let second = Money::from_cents(55000).percentage(DiscountRate::from_bps(2000));
        let third = Money::from_cents(50000).percentage(DiscountRate::from_bps(2500));
        assert_eq!(second.cents(), 11000);
        assert_eq!(third.cents(), 12500);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        // 0.5 Rappen rounds up: 1 cent * 50% = 0.5 → 1
        assert_eq!(Money::from_cents(1).percentage(DiscountRate::from_bps(5000)).cents(), 1);
        // 0.49 Rappen rounds down
        assert_eq!(Money::from_cents(1).percentage(DiscountRate::from_bps(4900)).cents(), 0);
        // negative amounts round away from zero
        assert_eq!(Money::from_cents(-1).percentage(DiscountRate::from_bps(5000)).cents(), -1);
    }

    #[test]
    fn test_clamp_non_negative() {
        assert_eq!(Money::from_cents(-1).clamp_non_negative(), Money::zero());
        assert_eq!(Money::from_cents(42).clamp_non_negative().cents(), 42);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let negative = Money::from_cents(-100);
        assert!(negative.is_negative());
        assert_eq!(negative.abs().cents(), 100);
    }
}
