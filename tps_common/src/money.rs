use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

pub const UAH_CURRENCY_CODE: &str = "UAH";

//--------------------------------------       Money         ---------------------------------------------------------
/// A currency amount in minor units (cents / kopiyky). Stored as `i64` so that arithmetic and equality are exact;
/// the payment gateway's two-decimal wire format is produced by [`Money::to_decimal_string`].
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a money amount: {0}")]
pub struct MoneyConversionError(pub String);

impl From<i64> for Money {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_decimal_string())
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    /// Parses a decimal amount ("100", "100.5", "100.00") into minor units. Gateways are inconsistent about
    /// trailing zeros, so anything with at most two fractional digits is accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MoneyConversionError("empty string".into()));
        }
        let (sign, digits) = match s.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, s),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if frac.len() > 2 {
            return Err(MoneyConversionError(format!("too many decimal places in '{s}'")));
        }
        let whole = whole.parse::<i64>().map_err(|e| MoneyConversionError(format!("'{s}': {e}")))?;
        let frac_cents = match frac.len() {
            0 => 0,
            n => {
                let f = frac.parse::<i64>().map_err(|e| MoneyConversionError(format!("'{s}': {e}")))?;
                if n == 1 {
                    f * 10
                } else {
                    f
                }
            },
        };
        Ok(Self(sign * (whole * 100 + frac_cents)))
    }
}

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn from_whole(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Formats the amount with exactly two decimal places, as the gateway's signature base string requires.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }

    /// True if the two amounts agree to within one minor unit. Used for reconciliation matching, where the CRM
    /// may have gone through a floating-point representation on its side.
    pub fn matches(&self, other: Money) -> bool {
        (self.0 - other.0).abs() < 1
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_decimal_strings() {
        assert_eq!("100".parse::<Money>().unwrap(), Money::from_cents(10_000));
        assert_eq!("100.5".parse::<Money>().unwrap(), Money::from_cents(10_050));
        assert_eq!("100.00".parse::<Money>().unwrap(), Money::from_cents(10_000));
        assert_eq!("0.01".parse::<Money>().unwrap(), Money::from_cents(1));
        assert_eq!("-2.50".parse::<Money>().unwrap(), Money::from_cents(-250));
        assert!("1.005".parse::<Money>().is_err());
        assert!("".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
    }

    #[test]
    fn two_decimal_formatting() {
        assert_eq!(Money::from_cents(10_000).to_decimal_string(), "100.00");
        assert_eq!(Money::from_cents(5).to_decimal_string(), "0.05");
        assert_eq!(Money::from_cents(-250).to_decimal_string(), "-2.50");
        assert_eq!(Money::from_whole(1).to_decimal_string(), "1.00");
    }

    #[test]
    fn exact_cents_matching() {
        let a = Money::from_cents(10_000);
        assert!(a.matches(Money::from_cents(10_000)));
        assert!(!a.matches(Money::from_cents(10_001)));
    }
}
