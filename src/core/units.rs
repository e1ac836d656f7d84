//! Fixed-point token units
//!
//! Every amount is an integer count of the smallest unit. A human amount
//! `N` of an 18-decimal token is stored as `N * 10^18`. Conversion goes
//! through decimal strings only, so no floating point rounding can creep in.

use thiserror::Error;

/// Decimal places of every ledger token and of the native currency
pub const DECIMALS: u8 = 18;

/// 10^18, one whole token in base units
pub const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;

/// Unit conversion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitsError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Too many decimal places: {found} (max {max})")]
    TooManyDecimals { found: usize, max: u8 },
    #[error("Amount overflows 128-bit units: {0}")]
    Overflow(String),
}

/// Convert whole tokens to base units
///
/// `tokens(100) == 100 * 10^18`. Cannot overflow for any `u64` input.
pub fn tokens(whole: u64) -> u128 {
    whole as u128 * ONE_TOKEN
}

/// Parse a human amount such as `"1000000"` or `"0.5"` into base units
pub fn parse_units(amount: &str, decimals: u8) -> Result<u128, UnitsError> {
    let amount = amount.trim();
    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(UnitsError::InvalidAmount(amount.to_string()));
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) {
        return Err(UnitsError::InvalidAmount(amount.to_string()));
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return Err(UnitsError::TooManyDecimals {
            found: fraction.len(),
            max: decimals,
        });
    }

    let overflow = || UnitsError::Overflow(amount.to_string());
    let scale = 10u128.checked_pow(decimals as u32).ok_or_else(overflow)?;

    let whole_units = if whole.is_empty() {
        0
    } else {
        whole.parse::<u128>().map_err(|_| overflow())?
    };

    let fraction_units = if fraction.is_empty() {
        0
    } else {
        let padding = 10u128
            .checked_pow((decimals as usize - fraction.len()) as u32)
            .ok_or_else(overflow)?;
        fraction.parse::<u128>().map_err(|_| overflow())? * padding
    };

    whole_units
        .checked_mul(scale)
        .and_then(|units| units.checked_add(fraction_units))
        .ok_or_else(overflow)
}

/// Format base units as a human amount, trimming trailing zeros
pub fn format_units(units: u128, decimals: u8) -> String {
    if decimals == 0 {
        return units.to_string();
    }
    let scale = 10u128.pow(decimals as u32);
    let whole = units / scale;
    let fraction = units % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{:0width$}", fraction, width = decimals as usize);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_scaling() {
        assert_eq!(tokens(1), ONE_TOKEN);
        assert_eq!(tokens(1_000_000), 1_000_000 * ONE_TOKEN);
        assert_eq!(tokens(0), 0);
    }

    #[test]
    fn test_parse_whole_and_fractional() {
        assert_eq!(parse_units("1000000", DECIMALS).unwrap(), tokens(1_000_000));
        assert_eq!(parse_units("0.5", DECIMALS).unwrap(), ONE_TOKEN / 2);
        assert_eq!(parse_units(".25", DECIMALS).unwrap(), ONE_TOKEN / 4);
        assert_eq!(parse_units("1.", DECIMALS).unwrap(), ONE_TOKEN);
        assert_eq!(parse_units("0.000000000000000001", DECIMALS).unwrap(), 1);
        assert_eq!(parse_units("2.500", 2).unwrap(), 250);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            parse_units("", DECIMALS),
            Err(UnitsError::InvalidAmount(_))
        ));
        assert!(matches!(
            parse_units("-1", DECIMALS),
            Err(UnitsError::InvalidAmount(_))
        ));
        assert!(matches!(
            parse_units("1e18", DECIMALS),
            Err(UnitsError::InvalidAmount(_))
        ));
        assert!(matches!(
            parse_units("0.0000000000000000001", DECIMALS),
            Err(UnitsError::TooManyDecimals { found: 19, max: 18 })
        ));
        assert!(matches!(
            parse_units("1000000000000000000000000", DECIMALS),
            Err(UnitsError::Overflow(_))
        ));
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(tokens(999_900), DECIMALS), "999900");
        assert_eq!(format_units(ONE_TOKEN / 2, DECIMALS), "0.5");
        assert_eq!(format_units(1, DECIMALS), "0.000000000000000001");
        assert_eq!(format_units(0, DECIMALS), "0");
        assert_eq!(format_units(250, 0), "250");
    }
}
