use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use crate::errors::{LedgerError, Result};

/// minor units per major unit (centavos per peso)
pub const MINOR_PER_MAJOR: i64 = 100;

/// Money held as integer minor units (centavos)
///
/// Serialized as a bare integer so the boundary never carries floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);
    pub const CENTAVO: Money = Money(1);

    /// create from minor units (centavos)
    pub const fn from_minor(amount: i64) -> Self {
        Money(amount)
    }

    /// create from whole pesos
    pub const fn from_major(amount: i64) -> Self {
        Money(amount * MINOR_PER_MAJOR)
    }

    /// get minor units
    pub fn minor_units(&self) -> i64 {
        self.0
    }

    /// get as decimal in major units (2 dp)
    pub fn as_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// parse a major-unit decimal amount, rejecting sub-centavo precision
    pub fn from_decimal_exact(d: Decimal) -> Result<Self> {
        let scaled = d * Decimal::from(MINOR_PER_MAJOR);
        if scaled.fract() != Decimal::ZERO {
            return Err(LedgerError::Validation {
                message: format!("amount {} has more than 2 decimal places", d),
            });
        }
        scaled
            .to_i64()
            .map(Money)
            .ok_or_else(|| LedgerError::CalculationError {
                message: format!("amount {} out of range", d),
            })
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Money)
    }

    pub fn checked_mul(self, factor: i64) -> Option<Self> {
        self.0.checked_mul(factor).map(Money)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }

    /// sum that fails instead of wrapping
    pub fn try_sum<I>(amounts: I) -> Result<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts.into_iter().try_fold(Money::ZERO, |acc, m| {
            acc.checked_add(m).ok_or_else(|| LedgerError::CalculationError {
                message: format!("sum overflows minor units at {} + {}", acc, m),
            })
        })
    }

    /// product that fails instead of wrapping
    pub fn try_mul(self, factor: i64) -> Result<Money> {
        self.checked_mul(factor).ok_or_else(|| LedgerError::CalculationError {
            message: format!("{} x {} overflows minor units", self, factor),
        })
    }

    /// subtraction floored at zero
    pub fn saturating_sub_floor(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0).max(0))
    }

    /// apply a rate, rounding once to the nearest centavo with banker's rounding
    ///
    /// Every percentage discount in the crate goes through here.
    pub fn apply_rate(&self, rate: Rate) -> Result<Money> {
        let raw = Decimal::from(self.0) * rate.as_decimal();
        raw.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
            .to_i64()
            .map(Money)
            .ok_or_else(|| LedgerError::CalculationError {
                message: format!("{} x {} overflows minor units", self, rate),
            })
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = MINOR_PER_MAJOR as u64;
        write!(f, "{}{}.{:02}", sign, abs / per, abs % per)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    fn mul(self, factor: i64) -> Money {
        Money(self.0 * factor)
    }
}

/// saturates at the bounds; use `Money::try_sum` where overflow must be reported
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Money::saturating_add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc.saturating_add(*m))
    }
}

/// rate type for discount percentages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);
    pub const ONE: Rate = Rate(Decimal::ONE);

    /// create from decimal (e.g., 0.05 for 5%)
    pub fn from_decimal(d: Decimal) -> Self {
        Rate(d)
    }

    /// create from percentage (e.g., 5 for 5%)
    pub fn from_percentage(p: u32) -> Self {
        Rate(Decimal::from(p) / Decimal::from(100))
    }

    /// create from basis points (e.g., 500 for 5%)
    pub fn from_bps(bps: u32) -> Self {
        Rate(Decimal::from(bps) / Decimal::from(10000))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn as_percentage(&self) -> Decimal {
        self.0 * Decimal::from(100)
    }

    /// true when 0% <= rate <= 100%
    pub fn is_fraction(&self) -> bool {
        self.0 >= Decimal::ZERO && self.0 <= Decimal::ONE
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage().normalize())
    }
}

impl From<Decimal> for Rate {
    fn from(d: Decimal) -> Self {
        Rate::from_decimal(d)
    }
}
