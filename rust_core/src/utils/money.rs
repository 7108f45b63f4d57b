//! Decimal price helpers.
//!
//! Exchange prices arrive as decimal strings and are kept as
//! [`rust_decimal::Decimal`] end to end. Conversion to `f64` happens only at
//! the RPC boundary, where the wire contract uses `double`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use thiserror::Error;

/// A price string that could not be read as a decimal number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid price format: {input:?}")]
pub struct PriceParseError {
    pub input: String,
}

// ============================================================================
// Standalone conversion functions
// ============================================================================

/// Parse an exchange price string (e.g. `"95123.45"`) into a decimal.
///
/// Surrounding whitespace is tolerated. Empty strings, non-numeric text and
/// trailing garbage are rejected. Only digits, signs, `.` and an exponent
/// marker are accepted; digit separators such as `_` are not.
pub fn parse_price(input: &str) -> Result<Decimal, PriceParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.chars().all(is_numeric_char) {
        return Err(PriceParseError {
            input: input.to_string(),
        });
    }

    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| PriceParseError {
            input: input.to_string(),
        })
}

fn is_numeric_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')
}

/// Fractional digits kept by the `rates` table (`DECIMAL(20, 8)`)
pub const STORAGE_SCALE: u32 = 8;

/// Round a price the way the `rates` columns store it.
///
/// PostgreSQL rounds `NUMERIC` half away from zero, not half to even.
pub fn to_storage_scale(price: Decimal) -> Decimal {
    price.round_dp_with_strategy(STORAGE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a decimal price to `f64` for the wire.
#[inline]
pub fn to_wire_f64(price: Decimal) -> f64 {
    price.to_f64().unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price_valid() {
        assert_eq!(parse_price("100.50").unwrap(), Decimal::new(10050, 2));
        assert_eq!(parse_price("100").unwrap(), Decimal::new(100, 0));
        assert_eq!(parse_price("0").unwrap(), Decimal::ZERO);
        assert_eq!(parse_price(" 81.25 ").unwrap(), Decimal::new(8125, 2));
    }

    #[test]
    fn test_parse_price_keeps_precision() {
        // 0.1 + 0.2 style drift must not appear
        let price = parse_price("0.30000001").unwrap();
        assert_eq!(price.to_string(), "0.30000001");
    }

    #[test]
    fn test_parse_price_invalid() {
        assert!(parse_price("invalid").is_err());
        assert!(parse_price("").is_err());
        assert!(parse_price("   ").is_err());
        assert!(parse_price("100.5abc").is_err());
        assert!(parse_price("1_000").is_err());
        assert!(parse_price("1__0").is_err());
        assert!(parse_price("_").is_err());
        assert!(parse_price("0x10").is_err());
        assert!(parse_price("1 000").is_err());
    }

    #[test]
    fn test_parse_price_scientific() {
        assert_eq!(parse_price("1.5e2").unwrap(), Decimal::new(150, 0));
        assert_eq!(parse_price("+2.5").unwrap(), Decimal::new(25, 1));
    }

    #[test]
    fn test_parse_price_error_names_input() {
        let err = parse_price("invalid").unwrap_err();
        assert_eq!(err.input, "invalid");
        assert!(err.to_string().contains("invalid price format"));
    }

    #[test]
    fn test_to_storage_scale() {
        let price = parse_price("100.123456789").unwrap();
        assert_eq!(to_storage_scale(price), parse_price("100.12345679").unwrap());

        // Midpoints round away from zero, like PostgreSQL
        let midpoint = parse_price("0.000000125").unwrap();
        assert_eq!(to_storage_scale(midpoint), parse_price("0.00000013").unwrap());

        let exact = Decimal::new(9585, 2);
        assert_eq!(to_storage_scale(exact), exact);
    }

    #[test]
    fn test_to_wire_f64() {
        assert_eq!(to_wire_f64(Decimal::new(10050, 2)), 100.5);
        assert_eq!(to_wire_f64(Decimal::ZERO), 0.0);
    }
}
