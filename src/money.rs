//! Money Module
//!
//! All amounts are `rust_decimal::Decimal` in a single fixed currency with
//! two decimal places. Amounts entering from clients or the provider are
//! validated here before they reach the ledger.
//!
//! ## Usage
//! ```rust
//! use pesa_wallet::money::{Amount, AmountLimits};
//!
//! let limits = AmountLimits::new(10, 150_000);
//! let amount = limits.check_whole(500)?;
//! assert_eq!(amount.to_string(), "500.00");
//! # Ok::<(), pesa_wallet::money::MoneyError>(())
//! ```

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Ledger precision (cents)
pub const SCALE: u32 = 2;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount {amount} is below the minimum of {min}")]
    BelowMinimum { amount: i64, min: i64 },

    #[error("Amount {amount} exceeds the maximum of {max}")]
    AboveMaximum { amount: i64, max: i64 },

    #[error("Amount must be a whole number, got {0}")]
    NotWhole(Decimal),

    #[error("Precision overflow: at most {SCALE} decimal places")]
    PrecisionOverflow,
}

// ============================================================================
// Amount: strictly positive value object
// ============================================================================

/// Strictly positive monetary amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value <= Decimal::ZERO {
            return Err(MoneyError::InvalidAmount);
        }
        if value.normalize().scale() > SCALE {
            return Err(MoneyError::PrecisionOverflow);
        }
        Ok(Self(value.round_dp(SCALE)))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Whole currency units, as the provider requires.
    pub fn whole_units(&self) -> Result<u64, MoneyError> {
        if !self.0.fract().is_zero() {
            return Err(MoneyError::NotWhole(self.0));
        }
        self.0.to_u64().ok_or(MoneyError::InvalidAmount)
    }

    /// `self - rhs` if the result is still positive.
    pub fn checked_sub(&self, rhs: Decimal) -> Option<Amount> {
        Amount::new(self.0 - rhs).ok()
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_amount(self.0))
    }
}

// ============================================================================
// Limits
// ============================================================================

/// Inclusive `[min, max]` range for whole-unit request amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountLimits {
    pub min: i64,
    pub max: i64,
}

impl AmountLimits {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// Validate a whole-unit amount against the range.
    pub fn check_whole(&self, amount: i64) -> Result<Amount, MoneyError> {
        if amount <= 0 {
            return Err(MoneyError::InvalidAmount);
        }
        if amount < self.min {
            return Err(MoneyError::BelowMinimum {
                amount,
                min: self.min,
            });
        }
        if amount > self.max {
            return Err(MoneyError::AboveMaximum {
                amount,
                max: self.max,
            });
        }
        Amount::new(Decimal::from(amount))
    }
}

// ============================================================================
// Format
// ============================================================================

/// Format with exactly two decimal places, e.g. `500` -> `"500.00"`.
pub fn format_amount(value: Decimal) -> String {
    format!("{:.prec$}", value.round_dp(SCALE), prec = SCALE as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1)).is_ok());
        assert_eq!(Amount::new(dec!(0)), Err(MoneyError::InvalidAmount));
        assert_eq!(Amount::new(dec!(-5)), Err(MoneyError::InvalidAmount));
        assert_eq!(
            Amount::new(dec!(1.005)),
            Err(MoneyError::PrecisionOverflow)
        );
        assert!(Amount::new(dec!(1.50)).is_ok());
    }

    #[test]
    fn test_limits_boundaries() {
        let limits = AmountLimits::new(10, 150_000);
        assert!(limits.check_whole(10).is_ok());
        assert!(limits.check_whole(150_000).is_ok());
        assert_eq!(
            limits.check_whole(9),
            Err(MoneyError::BelowMinimum { amount: 9, min: 10 })
        );
        assert_eq!(
            limits.check_whole(150_001),
            Err(MoneyError::AboveMaximum {
                amount: 150_001,
                max: 150_000
            })
        );
        assert_eq!(limits.check_whole(0), Err(MoneyError::InvalidAmount));
        assert_eq!(limits.check_whole(-20), Err(MoneyError::InvalidAmount));
    }

    #[test]
    fn test_whole_units() {
        assert_eq!(Amount::new(dec!(500)).unwrap().whole_units(), Ok(500));
        assert_eq!(
            Amount::new(dec!(10.50)).unwrap().whole_units(),
            Err(MoneyError::NotWhole(dec!(10.50)))
        );
    }

    #[test]
    fn test_checked_sub() {
        let gross = Amount::new(dec!(100)).unwrap();
        assert_eq!(gross.checked_sub(dec!(15)).unwrap().value(), dec!(85));
        assert!(gross.checked_sub(dec!(100)).is_none());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec!(500)), "500.00");
        assert_eq!(format_amount(dec!(0)), "0.00");
        assert_eq!(format_amount(dec!(12.5)), "12.50");
        assert_eq!(Amount::new(dec!(500)).unwrap().to_string(), "500.00");
    }

    #[test]
    fn test_amount_serde_rejects_non_positive() {
        let ok: Amount = serde_json::from_str("\"25.00\"").unwrap();
        assert_eq!(ok.value(), dec!(25));
        assert!(serde_json::from_str::<Amount>("\"0\"").is_err());
    }
}
