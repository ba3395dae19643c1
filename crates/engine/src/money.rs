use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError, Locale, ResultEngine};

/// Signed money amount represented as **integer centavos**.
///
/// Use this type for **all** monetary values in the engine (transaction
/// amounts, balances, import totals) to avoid floating-point drift.
///
/// The value is signed:
/// - positive = credit
/// - negative = debit
///
/// # Examples
///
/// ```rust
/// use engine::{Locale, Money};
///
/// let amount = Money::new(123_456);
/// assert_eq!(amount.to_string(), "R$ 1.234,56");
/// assert_eq!(Money::new(-2999).format(Locale::PtBr), "-R$ 29,99");
/// assert_eq!(Money::new(123_456).format(Locale::EnUs), "R$1,234.56");
/// ```
///
/// Parsing accepts `.` or `,` as decimal separator, thousands separators and
/// the currency symbol:
///
/// ```rust
/// use engine::Money;
///
/// assert_eq!("10,5".parse::<Money>().unwrap().minor(), 1050);
/// assert_eq!("R$ 1.234,56".parse::<Money>().unwrap().minor(), 123_456);
/// assert_eq!("1,234.56".parse::<Money>().unwrap().minor(), 123_456);
/// assert!("12.34.5".parse::<Money>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Money(i64);

/// Raw amount as received from a client: either a string to parse or a JSON
/// number in major units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl From<&str> for AmountInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for AmountInput {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl Money {
    pub const ZERO: Money = Money(0);

    /// Default magnitude bound applied by [`Money::parse`]: R$ 100 billion.
    pub const DEFAULT_LIMIT: Money = Money(10_000_000_000_000);

    /// Creates a new amount from integer centavos.
    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns `true` if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[must_use]
    pub const fn abs(self) -> Money {
        Money(self.0.abs())
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Parses user input with the default magnitude bound.
    pub fn parse(input: &str) -> ResultEngine<Money> {
        Self::parse_with_limit(input, Self::DEFAULT_LIMIT)
    }

    /// Parses a decimal string into centavos.
    ///
    /// Validation rules:
    /// - currency symbols (`R$`, `$`, `BRL`) and whitespace are ignored
    /// - a leading `-`/`+` (before or after the symbol) or surrounding
    ///   parentheses give the sign
    /// - the last `.`/`,` followed by 1-2 digits is the decimal separator,
    ///   every other separator must form valid thousands groups
    /// - max 2 fractional digits, magnitude must not exceed `limit`
    pub fn parse_with_limit(input: &str, limit: Money) -> ResultEngine<Money> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty amount"));
        }

        let (mut negative, inner) = match trimmed
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
        {
            Some(inner) => (true, inner),
            None => (false, trimmed),
        };

        let mut cleaned = inner.to_string();
        for symbol in ["R$", "BRL", "brl", "$"] {
            cleaned = cleaned.replace(symbol, "");
        }
        let cleaned: String = cleaned.chars().filter(|c| !c.is_whitespace()).collect();

        let body = if let Some(rest) = cleaned.strip_prefix('-') {
            if negative {
                return Err(invalid("conflicting signs"));
            }
            negative = true;
            rest
        } else if let Some(rest) = cleaned.strip_prefix('+') {
            rest
        } else {
            cleaned.as_str()
        };

        if let Some(bad) = body
            .chars()
            .find(|c| !c.is_ascii_digit() && *c != '.' && *c != ',')
        {
            return Err(invalid(&format!("unexpected character '{bad}'")));
        }
        if !body.chars().any(|c| c.is_ascii_digit()) {
            return Err(invalid("no digits"));
        }

        let (integer, fraction) = split_decimal(body)?;
        let major: i64 = if integer.is_empty() {
            0
        } else {
            integer.parse().map_err(|_| exceeds(limit))?
        };
        let cents: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid("invalid amount"))? * 10,
            _ => fraction.parse::<i64>().map_err(|_| invalid("invalid amount"))?,
        };

        let total = major
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(|| exceeds(limit))?;
        if total > limit.0.abs() {
            return Err(exceeds(limit));
        }

        Ok(Money(if negative { -total } else { total }))
    }

    /// Converts a major-unit float (e.g. a JSON number) into centavos,
    /// rounding half-up on the third fractional digit.
    pub fn from_f64(value: f64, limit: Money) -> ResultEngine<Money> {
        if !value.is_finite() {
            return Err(invalid("amount must be a finite number"));
        }

        // Display for f64 never uses exponent notation and yields the
        // shortest representation that round-trips.
        let text = value.abs().to_string();
        let (integer, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));
        let mut digits = fraction.chars().map(|c| c.to_digit(10).unwrap_or(0) as i64);
        let tenths = digits.next().unwrap_or(0);
        let hundredths = digits.next().unwrap_or(0);
        let round_up = digits.next().is_some_and(|d| d >= 5);

        let major: i64 = integer.parse().map_err(|_| exceeds(limit))?;
        let total = major
            .checked_mul(100)
            .and_then(|v| v.checked_add(tenths * 10 + hundredths + i64::from(round_up)))
            .ok_or_else(|| exceeds(limit))?;
        if total > limit.0.abs() {
            return Err(exceeds(limit));
        }

        Ok(Money(if value < 0.0 { -total } else { total }))
    }

    /// Parses either shape of [`AmountInput`].
    pub fn from_input(input: &AmountInput, limit: Money) -> ResultEngine<Money> {
        match input {
            AmountInput::Number(value) => Self::from_f64(*value, limit),
            AmountInput::Text(text) => Self::parse_with_limit(text, limit),
        }
    }

    /// Renders the amount with exactly two fractional digits following the
    /// conventions of `locale`.
    #[must_use]
    pub fn format(self, locale: Locale) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let major = (abs / 100).to_string();
        let minor = abs % 100;

        let mut grouped = String::with_capacity(major.len() + major.len() / 3);
        for (i, digit) in major.chars().enumerate() {
            if i > 0 && (major.len() - i) % 3 == 0 {
                grouped.push(locale.group_separator());
            }
            grouped.push(digit);
        }

        format!(
            "{sign}{symbol}{gap}{grouped}{dec}{minor:02}",
            symbol = Currency::Brl.symbol(),
            gap = locale.symbol_gap(),
            dec = locale.decimal_separator(),
        )
    }

    /// Partitions the amount into `parts` amounts whose sum is exactly
    /// `self`. Remainder centavos go to the first parts.
    ///
    /// ```rust
    /// use engine::Money;
    ///
    /// let parts = Money::new(10_000).split_even(3);
    /// assert_eq!(parts, vec![Money::new(3334), Money::new(3333), Money::new(3333)]);
    /// ```
    #[must_use]
    pub fn split_even(self, parts: usize) -> Vec<Money> {
        if parts == 0 {
            return Vec::new();
        }
        let count = parts as u64;
        let abs = self.0.unsigned_abs();
        let base = abs / count;
        let remainder = abs % count;

        (0..count)
            .map(|i| {
                let share = (base + u64::from(i < remainder)) as i64;
                Money(if self.0 < 0 { -share } else { share })
            })
            .collect()
    }
}

fn invalid(message: &str) -> EngineError {
    EngineError::InvalidAmount(message.to_string())
}

fn exceeds(limit: Money) -> EngineError {
    EngineError::InvalidAmount(format!("amount exceeds the limit of {}", limit.abs()))
}

/// Splits the digits/separators body into `(integer digits, fraction digits)`.
fn split_decimal(body: &str) -> ResultEngine<(String, String)> {
    let Some(last) = body.rfind(['.', ',']) else {
        return Ok((body.to_string(), String::new()));
    };
    let separator = body[last..].chars().next().unwrap_or('.');
    let head = &body[..last];
    let tail = &body[last + 1..];

    match tail.len() {
        0..=2 => {
            if head.contains(separator) {
                return Err(invalid("multiple decimal separators"));
            }
            let group = if separator == '.' { ',' } else { '.' };
            let integer = ungroup(head, group)
                .ok_or_else(|| invalid("misplaced thousands separator"))?;
            Ok((integer, tail.to_string()))
        }
        3 => {
            if body.contains(if separator == '.' { ',' } else { '.' }) {
                return Err(invalid("too many decimals"));
            }
            let integer = ungroup(body, separator)
                .ok_or_else(|| invalid("multiple decimal separators"))?;
            Ok((integer, String::new()))
        }
        _ => {
            if head.contains(['.', ',']) {
                Err(invalid("misplaced thousands separator"))
            } else {
                Err(invalid("too many decimals"))
            }
        }
    }
}

/// Removes thousands separators, checking group widths.
fn ungroup(head: &str, separator: char) -> Option<String> {
    if head.contains(if separator == '.' { ',' } else { '.' }) {
        return None;
    }
    if !head.contains(separator) {
        return Some(head.to_string());
    }

    let mut groups = head.split(separator);
    let first = groups.next()?;
    if first.is_empty() || first.len() > 3 || first.starts_with('0') {
        return None;
    }
    let mut digits = first.to_string();
    for group in groups {
        if group.len() != 3 {
            return None;
        }
        digits.push_str(group);
    }
    Some(digits)
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(Locale::PtBr))
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl FromStr for Money {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}
