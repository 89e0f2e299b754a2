//! Decimal numeric type backed by rust_decimal.
//!
//! All ledger money, prices and weights go through this type. Values are
//! serialized as JSON numbers, so anything persisted is rounded to a scale
//! that survives the trip through `f64` (see [`Decimal::money`] and friends).

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal as RustDecimal, MathematicalOps, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

/// Decimal scale for cash amounts and P&L.
pub const MONEY_DP: u32 = 2;
/// Decimal scale for unit quantities.
pub const UNITS_DP: u32 = 8;
/// Decimal scale for values expressed in percent.
pub const PCT_DP: u32 = 2;
/// Decimal scale for fractional ratios and weights.
pub const RATIO_DP: u32 = 4;
/// Significant digits an `f64` carries through a decimal round trip.
pub const F64_SIGNIFICANT_DIGITS: u32 = 15;

/// Decimal type for financial calculations.
///
/// Serializes to a JSON number (not a string).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "json_number")] RustDecimal);

/// JSON number encoding that reads back the value it wrote.
///
/// The decimal text is parsed to the nearest `f64` on the way out, and
/// `rust_decimal` rebuilds from the shortest `f64` text on the way in, so any
/// value within [`F64_SIGNIFICANT_DIGITS`] survives unchanged.
mod json_number {
    use rust_decimal::Decimal as RustDecimal;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(value: &RustDecimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let nearest: f64 = value
            .to_string()
            .parse()
            .map_err(|e| <S::Error as serde::ser::Error>::custom(format!("decimal {} not representable: {}", value, e)))?;
        serializer.serialize_f64(nearest)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<RustDecimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        rust_decimal::serde::float::deserialize(deserializer)
    }
}

impl Decimal {
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Format without exponent notation and without trailing zeros.
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn one() -> Self {
        Decimal(RustDecimal::ONE)
    }

    pub fn hundred() -> Self {
        Decimal(RustDecimal::ONE_HUNDRED)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn abs(&self) -> Self {
        Decimal(self.0.abs())
    }

    /// Round half away from zero to `dp` decimal places.
    pub fn round_dp(&self, dp: u32) -> Self {
        Decimal(
            self.0
                .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Truncate toward zero to `dp` decimal places. Never increases magnitude.
    pub fn truncate_dp(&self, dp: u32) -> Self {
        Decimal(self.0.round_dp_with_strategy(dp, RoundingStrategy::ToZero))
    }

    /// Rounded to cash precision.
    pub fn money(&self) -> Self {
        self.round_dp(MONEY_DP)
    }

    /// Rounded to unit precision, keeping at most [`F64_SIGNIFICANT_DIGITS`]
    /// significant digits so the quantity persists exactly.
    pub fn units(&self) -> Self {
        let whole = self.0.abs().trunc();
        let int_digits = if whole.is_zero() {
            0
        } else {
            whole.to_string().len() as u32
        };
        self.round_dp(UNITS_DP.min(F64_SIGNIFICANT_DIGITS.saturating_sub(int_digits)))
    }

    /// Division that yields `None` instead of panicking on a zero divisor.
    pub fn checked_div(&self, rhs: Decimal) -> Option<Self> {
        self.0.checked_div(rhs.0).map(Decimal)
    }

    /// `self / total * 100`, or zero when `total` is zero.
    pub fn percent_of(&self, total: Decimal) -> Self {
        self.checked_div(total)
            .map(|ratio| ratio * Decimal::hundred())
            .unwrap_or_default()
    }

    /// Square root; `None` for negative values.
    pub fn sqrt(&self) -> Option<Self> {
        self.0.sqrt().map(Decimal)
    }

    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or_default()
    }

    /// Convert from `f64`; `None` for NaN or infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        RustDecimal::from_f64(value).map(Decimal)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }
}

impl From<u8> for Decimal {
    fn from(value: u8) -> Self {
        Decimal(RustDecimal::from(value))
    }
}

impl From<usize> for Decimal {
    fn from(value: usize) -> Self {
        Decimal(RustDecimal::from(value))
    }
}

// Arithmetic operations
impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl std::ops::Div for Decimal {
    type Output = Decimal;

    fn div(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 / rhs.0)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

impl std::ops::AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Decimal {
    fn sub_assign(&mut self, rhs: Decimal) {
        self.0 -= rhs.0;
    }
}

impl Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Self {
        iter.fold(Decimal::zero(), |acc, v| acc + v)
    }
}

impl<'a> Sum<&'a Decimal> for Decimal {
    fn sum<I: Iterator<Item = &'a Decimal>>(iter: I) -> Self {
        iter.fold(Decimal::zero(), |acc, v| acc + *v)
    }
}
