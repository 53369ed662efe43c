//! # Money
//!
//! Amounts in integer minor units (cents). All arithmetic is checked; an
//! overflow or underflow is a caller bug surfaced as `None`, never a wrap.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

/// A non-negative amount of currency in minor units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Construct from minor units (e.g. cents).
    #[must_use]
    pub const fn from_minor(units: u64) -> Self {
        Self(units)
    }

    /// The amount in minor units.
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition; `None` on overflow.
    #[must_use]
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Checked subtraction; `None` if `other` exceeds `self`.
    #[must_use]
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Saturating subtraction, clamped at zero.
    #[must_use]
    pub fn saturating_sub(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| {
            acc.checked_add(m).unwrap_or(Money(u64::MAX))
        })
    }
}
