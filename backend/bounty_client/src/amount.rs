//! # Amount
//!
//! Exact conversion between user-entered token amounts (`"5.25"`) and the
//! integer Planck values the chain works with.
//!
//! ## Rules
//!
//! - The integer is built digit by digit from the decimal string. No binary
//!   floating point is involved at any step, so `"0.1"` is exactly
//!   `1_000_000_000` Planck with 10 decimals.
//! - Fractional digits beyond the token's decimals are **truncated**, never
//!   rounded, so the converted value never exceeds what the user typed.
//! - Zero, negative, empty and malformed inputs are rejected with
//!   [`InvalidAmount`] before any transaction is built.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// An amount in Planck, the smallest indivisible unit of the native token.
///
/// Mirrors the runtime's `Balance = u128`. Serializes as a decimal string
/// because JSON numbers cannot carry 128-bit integers losslessly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Planck(pub u128);

impl Planck {
    pub const ZERO: Planck = Planck(0);

    pub fn saturating_add(self, other: Planck) -> Planck {
        Planck(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Planck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Planck {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Reasons a user-entered amount is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAmount {
    #[error("amount is empty")]
    Empty,

    #[error("amount must not be negative")]
    Negative,

    #[error("'{0}' is not a decimal number")]
    NotANumber(String),

    #[error("amount must be greater than 0")]
    NotPositive,

    #[error("amount is too large")]
    TooLarge,
}

/// Convert a decimal token amount into Planck using `decimals` fractional
/// places.
///
/// Accepts `digits`, `digits.`, `digits.digits` and `.digits`, with optional
/// surrounding whitespace.
pub fn to_planck(input: &str, decimals: u8) -> Result<Planck, InvalidAmount> {
    let input = input.trim();
    if input.is_empty() {
        return Err(InvalidAmount::Empty);
    }
    if input.contains('-') {
        return Err(InvalidAmount::Negative);
    }

    let (int_part, frac_part) = input.split_once('.').unwrap_or((input, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty())
        || !all_digits(int_part)
        || !all_digits(frac_part)
    {
        return Err(InvalidAmount::NotANumber(input.to_string()));
    }

    let decimals = usize::from(decimals);
    let frac_digits = frac_part
        .bytes()
        .take(decimals)
        .chain(std::iter::repeat(b'0'))
        .take(decimals);

    let mut value: u128 = 0;
    for digit in int_part.bytes().chain(frac_digits) {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u128::from(digit - b'0')))
            .ok_or(InvalidAmount::TooLarge)?;
    }

    if value == 0 {
        return Err(InvalidAmount::NotPositive);
    }
    Ok(Planck(value))
}

/// Render a Planck value as a token amount, dropping trailing fractional
/// zeros (`52_500_000_000` with 10 decimals is `"5.25"`).
pub fn format_planck(value: Planck, decimals: u8) -> String {
    let digits = value.0.to_string();
    let decimals = usize::from(decimals);
    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{:0>width$}", digits, width = decimals + 1)
    } else {
        digits
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');

    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_part}")
    }
}

/// [`format_planck`] followed by the token symbol, e.g. `"12.5 DOT"`.
pub fn format_with_symbol(value: Planck, decimals: u8, symbol: &str) -> String {
    format!("{} {}", format_planck(value, decimals), symbol)
}
