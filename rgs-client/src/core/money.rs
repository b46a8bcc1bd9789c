//! Fixed-Point Money
//!
//! Every monetary value that crosses the wire is an integer count of
//! micro-units (10^-6 of the currency unit). Floating point only exists at
//! the display boundary.
//!
//! ## Format
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Amount = i64, scale 10^6                                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  1.00 USD     ->  1_000_000                                 │
//! │  0.10 USD     ->    100_000                                 │
//! │  Exact f64 round trip for |n| < 2^50                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Payout multipliers are kept in hundredths (`PayoutMultiplier`), so the
//! engine never multiplies money by a float.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed-point monetary amount in micro-units.
pub type Amount = i64;

/// Number of micro-units in one currency unit.
pub const MONETARY_SCALE: i64 = 1_000_000;

/// Largest magnitude `to_fixed` accepts (2^53).
pub const MAX_EXACT_AMOUNT: Amount = 1 << 53;

/// Conversion failures at the float boundary.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum MoneyError {
    /// NaN or infinite input.
    #[error("amount is not a finite number")]
    NotFinite,

    /// Scaled value does not fit the exactly representable range.
    #[error("amount {0} is outside the representable range")]
    OutOfRange(f64),
}

/// Convert a display amount to fixed-point: `round(value * 10^6)`.
///
/// # Example
/// ```
/// use rgs_client::core::money::to_fixed;
/// assert_eq!(to_fixed(1.00).unwrap(), 1_000_000);
/// assert_eq!(to_fixed(0.1).unwrap(), 100_000);
/// ```
pub fn to_fixed(value: f64) -> Result<Amount, MoneyError> {
    if !value.is_finite() {
        return Err(MoneyError::NotFinite);
    }
    let scaled = (value * MONETARY_SCALE as f64).round();
    if scaled.abs() > MAX_EXACT_AMOUNT as f64 {
        return Err(MoneyError::OutOfRange(value));
    }
    Ok(scaled as Amount)
}

/// Convert a fixed-point amount to a display float.
///
/// Only for rendering. Never feed the result back into accounting.
#[inline]
pub fn from_fixed(amount: Amount) -> f64 {
    amount as f64 / MONETARY_SCALE as f64
}

/// Format an amount with six decimals, without going through `f64`.
pub fn format_amount(amount: Amount) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    let scale = MONETARY_SCALE as u64;
    format!("{}{}.{:06}", sign, abs / scale, abs % scale)
}

// =============================================================================
// PAYOUT MULTIPLIER
// =============================================================================

/// Payout multiplier in hundredths of the wager (`150` = 1.5x).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayoutMultiplier(pub u64);

impl PayoutMultiplier {
    /// 0x.
    pub const ZERO: Self = Self(0);

    /// Multiplier from a whole factor (`from_whole(2)` = 2x).
    pub const fn from_whole(factor: u64) -> Self {
        Self(factor * 100)
    }

    /// Raw hundredths.
    #[inline]
    pub const fn hundredths(self) -> u64 {
        self.0
    }

    /// Apply to a wager, truncating toward zero.
    pub fn apply(self, wager: Amount) -> Amount {
        let product = wager as i128 * self.0 as i128 / 100;
        product.clamp(i64::MIN as i128, i64::MAX as i128) as Amount
    }

    /// Scale by an integer spot multiplier, saturating.
    pub fn scaled(self, factor: u64) -> Self {
        Self(self.0.saturating_mul(factor))
    }

    /// Display value (1.5 for `150`).
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl std::ops::Add for PayoutMultiplier {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign for PayoutMultiplier {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl fmt::Display for PayoutMultiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}x", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_one_unit() {
        assert_eq!(to_fixed(1.00).unwrap(), 1_000_000);
        assert_eq!(from_fixed(1_000_000), 1.0);
    }

    #[test]
    fn test_rounding_not_truncation() {
        // 0.1 * 1e6 is 99999.99999999999 in binary floating point
        assert_eq!(to_fixed(0.1).unwrap(), 100_000);
        assert_eq!(to_fixed(2.675).unwrap(), 2_675_000);
        assert_eq!(to_fixed(-0.5).unwrap(), -500_000);
    }

    #[test]
    fn test_rejects_non_finite() {
        assert_eq!(to_fixed(f64::NAN), Err(MoneyError::NotFinite));
        assert_eq!(to_fixed(f64::INFINITY), Err(MoneyError::NotFinite));
        assert!(matches!(to_fixed(1e300), Err(MoneyError::OutOfRange(_))));
    }

    #[test]
    fn test_repeated_conversion_has_no_drift() {
        let mut amount = 123_456_789;
        for _ in 0..1000 {
            amount = to_fixed(from_fixed(amount)).unwrap();
        }
        assert_eq!(amount, 123_456_789);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1_500_000), "1.500000");
        assert_eq!(format_amount(-100), "-0.000100");
        assert_eq!(format_amount(0), "0.000000");
    }

    #[test]
    fn test_payout_multiplier_apply() {
        assert_eq!(PayoutMultiplier(150).apply(1_000_000), 1_500_000);
        assert_eq!(PayoutMultiplier::from_whole(2).apply(100), 200);
        assert_eq!(PayoutMultiplier(78).scaled(4), PayoutMultiplier(312));
        assert_eq!(PayoutMultiplier(1234).to_string(), "12.34x");
    }

    proptest! {
        #[test]
        fn prop_fixed_round_trip(n in -(1i64 << 50)..(1i64 << 50)) {
            prop_assert_eq!(to_fixed(from_fixed(n)).unwrap(), n);
        }

        #[test]
        fn prop_cents_round_trip(cents in 0i64..10_000_000_000) {
            let display = cents as f64 / 100.0;
            let fixed = to_fixed(display).unwrap();
            prop_assert_eq!(fixed, cents * 10_000);
        }
    }
}
