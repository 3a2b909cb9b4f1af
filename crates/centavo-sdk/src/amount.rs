//! Parsing and formatting of satoshi amounts with a configurable decimal point.
//!
//! eCash UIs show amounts in XEC (2 decimal places, 100 sats = 1 XEC); the
//! engine always works in integer satoshis.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseAmountError {
    #[error("empty amount")]
    Empty,

    #[error("invalid character in amount")]
    InvalidChar,

    #[error("more than one decimal separator")]
    MultipleSeparators,

    #[error("too many decimal places")]
    TooManyDecimals,

    #[error("amount out of range")]
    Overflow,
}

/// Parse a plain decimal string (`"12.34"`) into satoshis at the given
/// decimal point. No thousands separators, no sign.
pub fn parse_amount(text: &str, decimal_point: u8) -> Result<u64, ParseAmountError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseAmountError::Empty);
    }

    let mut parts = text.split('.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next().unwrap_or("");
    if parts.next().is_some() {
        return Err(ParseAmountError::MultipleSeparators);
    }
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(ParseAmountError::Empty);
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ParseAmountError::InvalidChar);
    }
    if frac_part.len() > decimal_point as usize {
        return Err(ParseAmountError::TooManyDecimals);
    }

    let scale = 10u64
        .checked_pow(decimal_point as u32)
        .ok_or(ParseAmountError::Overflow)?;
    let int_units: u64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| ParseAmountError::Overflow)?
    };

    // Right-pad the fraction to the full decimal width.
    let mut frac_units: u64 = 0;
    if !frac_part.is_empty() {
        frac_units = frac_part.parse().map_err(|_| ParseAmountError::Overflow)?;
        let missing = decimal_point as usize - frac_part.len();
        frac_units = frac_units
            .checked_mul(10u64.pow(missing as u32))
            .ok_or(ParseAmountError::Overflow)?;
    }

    int_units
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_units))
        .ok_or(ParseAmountError::Overflow)
}

/// Format satoshis as a plain decimal string at the given decimal point,
/// with trailing zeros in the fraction trimmed.
pub fn format_satoshis(sats: u64, decimal_point: u8) -> String {
    let scale = 10u64.pow(decimal_point as u32);
    let int_part = sats / scale;
    let frac_part = sats % scale;
    if frac_part == 0 {
        return int_part.to_string();
    }
    let frac = format!("{:0width$}", frac_part, width = decimal_point as usize);
    let frac = frac.trim_end_matches('0');
    format!("{}.{}", int_part, frac)
}

/// The display name of the base unit at a given decimal point.
pub fn base_unit(decimal_point: u8) -> &'static str {
    match decimal_point {
        0 => "sats",
        2 => "XEC",
        5 => "mBCHA",
        8 => "BCHA",
        _ => "XEC",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_xec_amounts() {
        assert_eq!(parse_amount("12.34", 2).unwrap(), 1234);
        assert_eq!(parse_amount("12", 2).unwrap(), 1200);
        assert_eq!(parse_amount("0.01", 2).unwrap(), 1);
        assert_eq!(parse_amount(".5", 2).unwrap(), 50);
        assert_eq!(parse_amount("5.", 2).unwrap(), 500);
        assert_eq!(parse_amount("0", 2).unwrap(), 0);
    }

    #[test]
    fn parse_sat_amounts() {
        assert_eq!(parse_amount("1000", 0).unwrap(), 1000);
        assert_eq!(
            parse_amount("10.5", 0).unwrap_err(),
            ParseAmountError::TooManyDecimals
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_amount("", 2).unwrap_err(), ParseAmountError::Empty);
        assert_eq!(parse_amount("  ", 2).unwrap_err(), ParseAmountError::Empty);
        assert_eq!(parse_amount(".", 2).unwrap_err(), ParseAmountError::Empty);
        assert_eq!(
            parse_amount("12a", 2).unwrap_err(),
            ParseAmountError::InvalidChar
        );
        assert_eq!(
            parse_amount("-5", 2).unwrap_err(),
            ParseAmountError::InvalidChar
        );
        assert_eq!(
            parse_amount("1.2.3", 2).unwrap_err(),
            ParseAmountError::MultipleSeparators
        );
        assert_eq!(
            parse_amount("1.234", 2).unwrap_err(),
            ParseAmountError::TooManyDecimals
        );
    }

    #[test]
    fn format_trims_trailing_zeros() {
        assert_eq!(format_satoshis(1234, 2), "12.34");
        assert_eq!(format_satoshis(1200, 2), "12");
        assert_eq!(format_satoshis(1230, 2), "12.3");
        assert_eq!(format_satoshis(1, 2), "0.01");
        assert_eq!(format_satoshis(0, 2), "0");
    }

    #[test]
    fn parse_format_round_trip() {
        for sats in [0u64, 1, 99, 100, 1234, 10_000, 123_456_789] {
            let text = format_satoshis(sats, 2);
            assert_eq!(parse_amount(&text, 2).unwrap(), sats, "for {}", text);
        }
    }
}
