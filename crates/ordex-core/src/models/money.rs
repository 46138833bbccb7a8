//! Monetary amounts in integer cents.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::MoneyError;

/// Currency symbols recognised in front of (or behind) an amount.
const SYMBOLS: [char; 4] = ['$', '£', '€', '¥'];

/// ISO codes that may prefix an amount instead of a symbol.
const CODES: [&str; 5] = ["USD", "GBP", "EUR", "CAD", "AUD"];

/// A monetary amount.
///
/// `cents` is authoritative. `display` keeps the text the amount was parsed
/// from so fixtures can be compared against the page. Two amounts are equal
/// when cents and currency match, whatever their display text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Money {
    /// Currency symbol or code as it appeared, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// Source text.
    pub display: String,

    /// Signed value in cents.
    pub cents: i64,
}

impl Money {
    /// Parse an amount such as `$1,234.50`, `-$10.54` or `EUR 3.5`.
    pub fn parse(text: &str) -> Result<Self, MoneyError> {
        let trimmed = text.trim();

        let mut currency = None;
        let mut rest = trimmed.to_string();
        for code in CODES {
            if rest.contains(code) {
                currency = Some(code.to_string());
                rest = rest.replace(code, "");
                break;
            }
        }

        let negative = rest.contains('-') || (rest.contains('(') && rest.contains(')'));

        let mut digits = String::with_capacity(rest.len());
        for c in rest.chars() {
            match c {
                '0'..='9' | '.' => digits.push(c),
                c if SYMBOLS.contains(&c) => {
                    if currency.is_none() {
                        currency = Some(c.to_string());
                    }
                }
                ',' | '-' | '+' | '(' | ')' => {}
                c if c.is_whitespace() => {}
                _ => return Err(MoneyError::Invalid(trimmed.to_string())),
            }
        }

        let parts: Vec<&str> = digits.split('.').collect();
        if parts.len() > 2 {
            return Err(MoneyError::MultipleDecimalPoints(trimmed.to_string()));
        }

        let whole = parts[0];
        let fraction = parts.get(1).copied().unwrap_or("");
        if whole.is_empty() && fraction.is_empty() {
            return Err(MoneyError::Empty(trimmed.to_string()));
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| MoneyError::OutOfRange(trimmed.to_string()))?
        };

        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map(|d| d * 10).unwrap_or(0),
            2 => fraction.parse().unwrap_or(0),
            _ => return Err(MoneyError::Fraction(trimmed.to_string())),
        };

        // Sign applies to the whole amount, not only the integer part.
        let magnitude = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction))
            .ok_or_else(|| MoneyError::OutOfRange(trimmed.to_string()))?;

        Ok(Self {
            currency,
            display: trimmed.to_string(),
            cents: if negative { -magnitude } else { magnitude },
        })
    }

    /// Build an amount from a numeric value, rounded to whole cents.
    pub fn from_decimal(value: Decimal, currency: Option<&str>) -> Result<Self, MoneyError> {
        let cents = (value * Decimal::ONE_HUNDRED)
            .round()
            .to_i64()
            .ok_or_else(|| MoneyError::OutOfRange(value.to_string()))?;
        Ok(Self::from_cents(cents, currency))
    }

    /// Build an amount from cents; the display text is the canonical format.
    pub fn from_cents(cents: i64, currency: Option<&str>) -> Self {
        let mut money = Self {
            currency: currency.map(str::to_string),
            display: String::new(),
            cents,
        };
        money.display = money.to_string();
        money
    }

    /// Zero in the given currency.
    pub fn zero(currency: Option<&str>) -> Self {
        Self::from_cents(0, currency)
    }

    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    pub fn abs(&self) -> Self {
        Self::from_cents(self.cents.saturating_abs(), self.currency.as_deref())
    }

    /// Multiply by an item quantity, saturating at the `i64` bounds.
    pub fn times(&self, quantity: u32) -> Self {
        Self::from_cents(
            self.cents.saturating_mul(i64::from(quantity)),
            self.currency.as_deref(),
        )
    }

    /// Multiply by an item quantity, failing when the result leaves `i64`.
    pub fn checked_times(&self, quantity: u32) -> Result<Self, MoneyError> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(|cents| Self::from_cents(cents, self.currency.as_deref()))
            .ok_or_else(|| MoneyError::OutOfRange(format!("{} x {}", self, quantity)))
    }

    pub fn checked_add(&self, other: &Self) -> Result<Self, MoneyError> {
        self.cents
            .checked_add(other.cents)
            .map(|cents| self.combine(other, cents))
            .ok_or_else(|| MoneyError::OutOfRange(format!("{} + {}", self, other)))
    }

    pub fn checked_sub(&self, other: &Self) -> Result<Self, MoneyError> {
        self.cents
            .checked_sub(other.cents)
            .map(|cents| self.combine(other, cents))
            .ok_or_else(|| MoneyError::OutOfRange(format!("{} - {}", self, other)))
    }

    /// Sum amounts, failing on overflow.
    pub fn checked_sum<'a, I>(amounts: I) -> Result<Self, MoneyError>
    where
        I: IntoIterator<Item = &'a Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(None), |acc, m| acc.checked_add(m))
    }

    /// The amount as a decimal with two places.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.cents, 2)
    }

    fn combine(&self, other: &Self, cents: i64) -> Self {
        let currency = self.currency.as_deref().or(other.currency.as_deref());
        Self::from_cents(cents, currency)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.cents == other.cents && self.currency == other.currency
    }
}

impl Eq for Money {}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(
            f,
            "{}{}{}.{:02}",
            sign,
            self.currency.as_deref().unwrap_or(""),
            abs / 100,
            abs % 100
        )
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        self.combine(&rhs, self.cents.saturating_add(rhs.cents))
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        self.combine(&rhs, self.cents.saturating_sub(rhs.cents))
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money::from_cents(self.cents.saturating_neg(), self.currency.as_deref())
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(None), |acc, m| acc + m)
    }
}

impl std::str::FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_plain_amounts() {
        let m = Money::parse("$8.00").unwrap();
        assert_eq!(m.cents, 800);
        assert_eq!(m.currency.as_deref(), Some("$"));
        assert_eq!(m.display, "$8.00");

        assert_eq!(Money::parse("1,234.50").unwrap().cents, 123450);
        assert_eq!(Money::parse("$ 96.33").unwrap().cents, 9633);
        assert_eq!(Money::parse("12").unwrap().cents, 1200);
        assert_eq!(Money::parse("3.5").unwrap().cents, 350);
        assert_eq!(Money::parse(".99").unwrap().cents, 99);
    }

    #[test]
    fn test_sign_applies_to_fraction() {
        assert_eq!(Money::parse("-$10.54").unwrap().cents, -1054);
        assert_eq!(Money::parse("$-0.54").unwrap().cents, -54);
        assert_eq!(Money::parse("($18.46)").unwrap().cents, -1846);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Money::parse("1.2.3"),
            Err(MoneyError::MultipleDecimalPoints(_))
        ));
        assert!(matches!(Money::parse("$"), Err(MoneyError::Empty(_))));
        assert!(matches!(Money::parse("abc"), Err(MoneyError::Invalid(_))));
        assert!(matches!(Money::parse("1.234"), Err(MoneyError::Fraction(_))));
    }

    #[test]
    fn test_iso_code_currency() {
        let m = Money::parse("EUR 3.50").unwrap();
        assert_eq!(m.currency.as_deref(), Some("EUR"));
        assert_eq!(m.cents, 350);
        assert_eq!(m.to_string(), "EUR3.50");
    }

    #[test]
    fn test_format_round_trip_keeps_cents() {
        for text in ["$1,234.50", "-$10.54", "£0.05", "7", "$1.5", "€12,000.00"] {
            let parsed = Money::parse(text).unwrap();
            let reparsed = Money::parse(&parsed.to_string()).unwrap();
            assert_eq!(parsed, reparsed, "{text}");
        }
        assert_eq!(Money::parse("1,234.50").unwrap().to_string(), "1234.50");
        assert_eq!(Money::parse("-$10.54").unwrap().to_string(), "-$10.54");
    }

    #[test]
    fn test_equality_ignores_display() {
        let a = Money::parse("$1,000.00").unwrap();
        let b = Money::parse("$1000").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, Money::parse("£1000").unwrap());
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::parse("$77.15").unwrap();
        let b = Money::parse("$11.55").unwrap();
        assert_eq!((a.clone() + b.clone()).cents, 8870);
        assert_eq!((a.clone() - b).cents, 6560);
        assert_eq!((-a.clone()).cents, -7715);
        assert_eq!(a.times(3).cents, 23145);

        let total: Money = vec![Money::parse("$1.00").unwrap(), Money::parse("$2.50").unwrap()]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_cents(350, Some("$")));
    }

    #[test]
    fn test_overflow_is_reported_not_panicked() {
        let yacht = Money::parse("$50,000,000,000,000,000.00").unwrap();
        assert_eq!(yacht.cents, 5_000_000_000_000_000_000);

        assert!(matches!(yacht.checked_times(3), Err(MoneyError::OutOfRange(_))));
        assert_eq!(yacht.checked_times(1).unwrap(), yacht);
        assert_eq!(yacht.times(3).cents, i64::MAX);

        let max = Money::from_cents(i64::MAX, Some("$"));
        let one = Money::parse("$0.01").unwrap();
        assert!(matches!(max.checked_add(&one), Err(MoneyError::OutOfRange(_))));
        assert_eq!((max.clone() + one.clone()).cents, i64::MAX);
        let min = Money::from_cents(i64::MIN, Some("$"));
        assert!(matches!(min.checked_sub(&one), Err(MoneyError::OutOfRange(_))));
        assert_eq!((-min).cents, i64::MAX);

        assert!(matches!(
            Money::checked_sum([&yacht, &yacht]),
            Err(MoneyError::OutOfRange(_))
        ));
        assert_eq!(Money::checked_sum([&one, &one]).unwrap().cents, 2);
    }

    #[test]
    fn test_from_decimal() {
        let m = Money::from_decimal(Decimal::new(1999, 2), Some("$")).unwrap();
        assert_eq!(m.cents, 1999);
        assert_eq!(m.to_decimal(), Decimal::new(1999, 2));
        assert_eq!(Money::from_decimal(Decimal::new(-5, 0), None).unwrap().cents, -500);
    }
}
