//! Quantity value types.
//!
//! Stock is tracked as a decimal so fractional units (litres, metres) work
//! the same as countable pieces. Two types keep the sign rules in the type
//! system: `Quantity` is what an item holds (never negative), and
//! `AdjustmentAmount` is what a caller supplies to an adjustment (strictly
//! positive).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Non-negative stock quantity.
///
/// Deserialization routes through `TryFrom`, so a negative value is
/// rejected at the boundary rather than smuggled past `new()`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Quantity(Decimal);

impl TryFrom<Decimal> for Quantity {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Quantity {
    /// Wrap a decimal, rejecting negative values.
    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DomainError::validation(format!(
                "quantity cannot be negative (got {value})"
            )));
        }
        Ok(Self(value))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, amount: AdjustmentAmount) -> Option<Self> {
        let result = self.0.checked_add(amount.value())?;
        Self::new(result).ok()
    }

    /// Subtract, returning `None` when the result would go negative.
    pub fn checked_sub(self, amount: AdjustmentAmount) -> Option<Self> {
        let result = self.0.checked_sub(amount.value())?;
        Self::new(result).ok()
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Quantity> for Decimal {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

/// Strictly positive amount supplied to an adjustment.
///
/// For `receive`/`consume` this is the delta magnitude; for `set` it is the
/// new absolute target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct AdjustmentAmount(Decimal);

impl TryFrom<Decimal> for AdjustmentAmount {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AdjustmentAmount> for Decimal {
    fn from(value: AdjustmentAmount) -> Self {
        value.0
    }
}

impl AdjustmentAmount {
    /// Wrap a decimal, rejecting zero and negative values.
    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value.is_sign_negative() || value.is_zero() {
            return Err(DomainError::validation(format!(
                "adjustment amount must be positive (got {value})"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// The amount as an absolute target quantity (used by `set`).
    pub fn as_quantity(&self) -> Quantity {
        Quantity(self.0)
    }
}

impl core::fmt::Display for AdjustmentAmount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
