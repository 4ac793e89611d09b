//! Fixed-point USDC amounts.
//!
//! Prices travel as human decimal strings (`"0.0001"`) and settle as integer
//! base units (`100`). Both directions go through [`TokenAmount`] so the
//! 6-decimal scale is applied identically at every boundary. No `f64`
//! anywhere in the pipeline.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::U256;

use crate::constants::TOKEN_DECIMALS;
use crate::X402Error;

/// A token amount held as integer base units (amount x 10^6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenAmount(U256);

impl TokenAmount {
    pub const ZERO: Self = Self(U256::ZERO);

    pub const fn from_base_units(units: U256) -> Self {
        Self(units)
    }

    pub const fn base_units(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Parse a human decimal string (`"1"`, `"0.0001"`, `"12.5"`).
    ///
    /// Rejects signs, exponents, whitespace inside the number, and more than
    /// six fractional digits. Excess precision is an error rather than a
    /// truncation: a price that cannot be represented exactly must not be
    /// rounded into a different one.
    pub fn parse_decimal(input: &str) -> Result<Self, X402Error> {
        let s = input.trim();
        let invalid = |why: &str| X402Error::MalformedRequest(format!("invalid amount '{input}': {why}"));

        let (integer, fraction) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };

        if integer.is_empty() && fraction.is_empty() {
            return Err(invalid("no digits"));
        }
        if !integer.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("only digits and a single '.' are allowed"));
        }

        let decimals = TOKEN_DECIMALS as usize;
        if fraction.len() > decimals {
            return Err(invalid("more than 6 fractional digits"));
        }

        let digits = format!("{integer}{fraction:0<decimals$}");
        let units = U256::from_str_radix(&digits, 10).map_err(|_| invalid("overflow"))?;
        Ok(Self(units))
    }

    /// Canonical decimal rendering: no trailing fractional zeros, no leading
    /// integer zeros, `"0"` for zero.
    pub fn to_decimal_string(&self) -> String {
        let decimals = TOKEN_DECIMALS as usize;
        let raw = self.0.to_string();
        let padded = format!("{raw:0>width$}", width = decimals + 1);
        let (integer, fraction) = padded.split_at(padded.len() - decimals);
        let fraction = fraction.trim_end_matches('0');
        if fraction.is_empty() {
            integer.to_string()
        } else {
            format!("{integer}.{fraction}")
        }
    }
}

impl FromStr for TokenAmount {
    type Err = X402Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_decimal(s)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl From<TokenAmount> for U256 {
    fn from(amount: TokenAmount) -> Self {
        amount.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(s: &str) -> u64 {
        TokenAmount::parse_decimal(s).unwrap().base_units().to::<u64>()
    }

    #[test]
    fn test_parse_default_price() {
        assert_eq!(units("0.0001"), 100);
    }

    #[test]
    fn test_parse_whole_and_fractional() {
        assert_eq!(units("1"), 1_000_000);
        assert_eq!(units("12.5"), 12_500_000);
        assert_eq!(units("0.000001"), 1);
        assert_eq!(units(".5"), 500_000);
        assert_eq!(units("3."), 3_000_000);
    }

    #[test]
    fn test_parse_rejects_excess_precision() {
        assert!(TokenAmount::parse_decimal("0.0000019").is_err());
    }

    #[test]
    fn test_parse_rejects_non_decimal_input() {
        for bad in ["", ".", "-1", "+1", "1e-4", "0x10", "1.2.3", "$0.01", "1 000", "NaN"] {
            assert!(TokenAmount::parse_decimal(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_parse_overflow_fails() {
        let huge = "9".repeat(80);
        assert!(TokenAmount::parse_decimal(&huge).is_err());
    }

    #[test]
    fn test_decimal_strings_round_trip() {
        for s in ["0", "0.0001", "0.000001", "1", "1.5", "10", "123456.654321", "0.1"] {
            let amount = TokenAmount::parse_decimal(s).unwrap();
            assert_eq!(amount.to_decimal_string(), s);
        }
    }

    #[test]
    fn test_base_units_round_trip() {
        for n in [0u64, 1, 9, 10, 99, 100, 999_999, 1_000_000, 1_000_001, 42_000_000_017] {
            let amount = TokenAmount::from_base_units(U256::from(n));
            let back = TokenAmount::parse_decimal(&amount.to_decimal_string()).unwrap();
            assert_eq!(back, amount);
        }
    }

    #[test]
    fn test_non_canonical_input_normalises() {
        let amount = TokenAmount::parse_decimal("00.000100").unwrap();
        assert_eq!(amount.base_units(), U256::from(100u64));
        assert_eq!(amount.to_string(), "0.0001");
    }
}
