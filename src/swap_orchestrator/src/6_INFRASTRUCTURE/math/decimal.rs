//! Decimal conversion between ledger base units and display strings
//!
//! Amounts stay integers end to end. Division by 10^decimals is done on
//! `BigUint` and the fractional part is produced as digits, so no binary
//! floating point is involved at any magnitude.

use candid::Nat;
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use rust_decimal::Decimal;

use crate::infrastructure::{CalculationError, Result, SwapError, ValidationError};

const GROUP_SEPARATOR: char = ',';
const DECIMAL_POINT: char = '.';

/// Largest scale `rust_decimal` accepts
const MAX_DECIMAL_SCALE: u32 = 28;

/// Format `amount` (base units) with `decimals` places, rounded half-up to
/// `rounding_digits` fractional digits, with `,` grouping.
///
/// Trailing fractional zeros are dropped, so zero renders as `"0"`.
///
/// ```text
/// to_display(123456789, 8, 3)        == "1.235"
/// to_display(123456789012345, 8, 3)  == "1,234,567.89"
/// to_display(42, 0, 3)               == "42"
/// ```
pub fn to_display(amount: &Nat, decimals: u32, rounding_digits: u32) -> String {
    let kept = rounding_digits.min(decimals);
    let dropped = decimals - kept;

    // Scale down to `kept` fractional digits, rounding half-up
    let mut scaled: BigUint = amount.0.clone();
    if dropped > 0 {
        let divisor = pow10(dropped);
        let half = &divisor / 2u32;
        scaled = (scaled + half) / divisor;
    }

    let unit = pow10(kept);
    let integer = &scaled / &unit;
    let fraction = &scaled % &unit;

    let mut out = group_digits(&integer.to_string());
    if kept > 0 && !fraction.is_zero() {
        let digits = format!("{:0>width$}", fraction.to_string(), width = kept as usize);
        out.push(DECIMAL_POINT);
        out.push_str(digits.trim_end_matches('0'));
    }
    out
}

/// Parse a display string back into base units.
///
/// Accepts `,` group separators in the integer part. More fractional digits
/// than `decimals` is a precision loss and is refused rather than rounded.
pub fn to_base_units(text: &str, decimals: u32) -> Result<Nat> {
    let invalid = |reason: &str| {
        SwapError::Validation(ValidationError::InvalidAmount {
            amount: text.to_string(),
            reason: reason.to_string(),
        })
    };

    let trimmed = text.trim();
    let (integer_part, fraction_part) = match trimmed.split_once(DECIMAL_POINT) {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };

    let integer_digits: String = integer_part.chars().filter(|c| *c != GROUP_SEPARATOR).collect();
    if integer_digits.is_empty() {
        return Err(invalid("missing integer digits"));
    }
    if !integer_digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("integer part must contain only digits and ',' separators"));
    }
    if !fraction_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("fractional part must contain only digits"));
    }
    if trimmed.ends_with(DECIMAL_POINT) {
        return Err(invalid("missing fractional digits after decimal point"));
    }

    let significant_fraction = fraction_part.trim_end_matches('0');
    if significant_fraction.len() > decimals as usize {
        return Err(SwapError::Calculation(CalculationError::PrecisionLoss {
            operation: "to_base_units".to_string(),
            details: format!(
                "{} has {} fractional digits, ledger supports {}",
                trimmed,
                significant_fraction.len(),
                decimals
            ),
        }));
    }

    let padded = format!("{:0<width$}", significant_fraction, width = decimals as usize);
    let all_digits = format!("{}{}", integer_digits, padded);
    let value = BigUint::parse_bytes(all_digits.as_bytes(), 10)
        .ok_or_else(|| invalid("not a decimal number"))?;

    Ok(Nat::from(value))
}

/// Exact `Decimal` view of a base-unit amount, for numeric consumers.
///
/// Fails when the value does not fit `rust_decimal`'s 96-bit mantissa or
/// the ledger uses more than 28 decimals.
pub fn to_decimal(amount: &Nat, decimals: u32) -> Result<Decimal> {
    if decimals > MAX_DECIMAL_SCALE {
        return Err(SwapError::Calculation(CalculationError::PrecisionLoss {
            operation: "to_decimal".to_string(),
            details: format!("scale {} exceeds {}", decimals, MAX_DECIMAL_SCALE),
        }));
    }

    let mantissa = amount.0.to_i128().ok_or_else(|| {
        SwapError::Calculation(CalculationError::Overflow {
            operation: format!("to_decimal({})", amount),
        })
    })?;

    Decimal::try_from_i128_with_scale(mantissa, decimals).map_err(|_| {
        SwapError::Calculation(CalculationError::Overflow {
            operation: format!("to_decimal({})", amount),
        })
    })
}

fn pow10(exp: u32) -> BigUint {
    BigUint::from(10u32).pow(exp)
}

fn group_digits(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(GROUP_SEPARATOR);
        }
        out.push(c);
    }
    out
}
