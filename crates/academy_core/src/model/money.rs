//! Fixed-point currency amounts.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

const MINOR_PER_MAJOR: i64 = 100;

/// Currency amount in minor units (cents).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyParseError {
    #[error("amount must not be empty")]
    Empty,
    #[error("amount `{0}` is not a decimal number with at most two fractional digits")]
    Malformed(String),
    #[error("amount `{0}` is out of range")]
    OutOfRange(String),
}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Whole currency units, e.g. `Money::from_major(50)` is `50.00`.
    pub const fn from_major(major: i64) -> Self {
        Self(major * MINOR_PER_MAJOR)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Parses `"50"`, `"49.5"`, `"-3.25"` into minor units.
    pub fn parse(value: &str) -> Result<Self, MoneyParseError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(MoneyParseError::Empty);
        }

        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (major_text, minor_text) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        let digits_only = |text: &str| text.chars().all(|ch| ch.is_ascii_digit());
        if major_text.is_empty()
            || !digits_only(major_text)
            || !digits_only(minor_text)
            || minor_text.len() > 2
            || (unsigned.contains('.') && minor_text.is_empty())
        {
            return Err(MoneyParseError::Malformed(trimmed.to_string()));
        }

        let out_of_range = || MoneyParseError::OutOfRange(trimmed.to_string());
        let major: i64 = major_text.parse().map_err(|_| out_of_range())?;
        let minor: i64 = match minor_text.len() {
            0 => 0,
            1 => minor_text.parse::<i64>().map_err(|_| out_of_range())? * 10,
            _ => minor_text.parse().map_err(|_| out_of_range())?,
        };
        let total = major
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|value| value.checked_add(minor))
            .ok_or_else(out_of_range)?;

        Ok(Self(if negative { -total } else { total }))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = MINOR_PER_MAJOR.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / per, abs % per)
    }
}

#[cfg(test)]
mod tests {
    use super::{Money, MoneyParseError};

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!(Money::parse("50").unwrap(), Money::from_minor(5000));
        assert_eq!(Money::parse(" 49.5 ").unwrap(), Money::from_minor(4950));
        assert_eq!(Money::parse("0.07").unwrap(), Money::from_minor(7));
        assert_eq!(Money::parse("-3.25").unwrap(), Money::from_minor(-325));
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert_eq!(Money::parse("  "), Err(MoneyParseError::Empty));
        for bad in ["1.234", ".5", "5.", "1,5", "abc", "--1"] {
            assert!(
                matches!(Money::parse(bad), Err(MoneyParseError::Malformed(_))),
                "`{bad}` should be malformed"
            );
        }
        assert!(matches!(
            Money::parse("99999999999999999999"),
            Err(MoneyParseError::OutOfRange(_))
        ));
    }

    #[test]
    fn displays_two_fraction_digits() {
        assert_eq!(Money::from_minor(5000).to_string(), "50.00");
        assert_eq!(Money::from_minor(7).to_string(), "0.07");
        assert_eq!(Money::from_minor(-325).to_string(), "-3.25");
    }
}
