//! Exact conversion between user-entered decimal strings and base units.
//!
//! Submitted values never pass through floating point: `"0.1"` with 18
//! decimals is exactly `100000000000000000`, and input with more precision
//! than the asset supports is rejected instead of rounded.

use alloy::primitives::U256;
use serde::Serialize;
use thiserror::Error;

/// Why a decimal string could not be turned into a base-unit amount.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("'{0}' is not a decimal number")]
    NotANumber(String),

    #[error("amount must be greater than zero")]
    NotPositive,

    #[error("'{input}' has more than {decimals} decimal places")]
    TooPrecise { input: String, decimals: u8 },

    #[error("amount is too large")]
    Overflow,
}

/// `10^decimals` as a U256.
pub fn scale(decimals: u8) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a positive decimal string (`"1"`, `"0.25"`, `".5"`, `"2."`) into base units.
///
/// Signs other than a leading `-` (reported as non-positive), exponents,
/// separators and whitespace inside the number are rejected.
pub fn parse_units(input: &str, decimals: u8) -> Result<U256, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }

    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (unsigned, ""),
    };
    if (int_part.is_empty() && frac_part.is_empty()) || !is_digits(int_part) || !is_digits(frac_part) {
        return Err(AmountError::NotANumber(trimmed.to_string()));
    }

    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.len() > decimals as usize {
        return Err(AmountError::TooPrecise {
            input: trimmed.to_string(),
            decimals,
        });
    }

    let whole = if int_part.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(int_part, 10).map_err(|_| AmountError::Overflow)?
    };
    let fraction = if frac_part.is_empty() {
        U256::ZERO
    } else {
        let padded = format!("{:0<width$}", frac_part, width = decimals as usize);
        U256::from_str_radix(&padded, 10).map_err(|_| AmountError::Overflow)?
    };

    let value = whole
        .checked_mul(scale(decimals))
        .and_then(|v| v.checked_add(fraction))
        .ok_or(AmountError::Overflow)?;

    if negative || value.is_zero() {
        return Err(AmountError::NotPositive);
    }
    Ok(value)
}

/// Render base units as a plain decimal string without trailing zeros.
pub fn format_units(value: U256, decimals: u8) -> String {
    let unit = scale(decimals);
    let whole = value / unit;
    let rem = value % unit;
    if rem.is_zero() {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", rem.to_string(), width = decimals as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Approximate value in whole units, for projections and gauges only.
pub fn to_f64_lossy(value: U256, decimals: u8) -> f64 {
    format_units(value, decimals).parse().unwrap_or(f64::MAX)
}
