//! Fixed-point <-> decimal conversions.
//!
//! Chain amounts are kept as exact integers (wei) everywhere inside the crate,
//! decimal strings appear only in storage records and rendering.

use alloy::primitives::{I256, Sign, U256};
use fastnum::D256;

use crate::error::IndexerError;

/// Scale of LLAMMA band reserves and shares.
pub const ETHER_DECIMALS: u8 = 18;

/// Widest band range accepted from chain data.
pub const MAX_BAND_SPAN: u64 = 2048;

/// Converter between fixed-point integers with a fixed number of decimals and
/// their decimal representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Converter {
    decimals: u8,
}

impl Default for Converter {
    fn default() -> Self { Self::ether() }
}

impl Converter {
    pub const fn new(decimals: u8) -> Self { Self { decimals } }

    pub const fn ether() -> Self { Self::new(ETHER_DECIMALS) }

    pub fn decimals(&self) -> u8 { self.decimals }

    fn scale(&self) -> U256 { U256::from(10).pow(U256::from(self.decimals)) }

    /// Formats unsigned fixed-point value, always keeping at least one
    /// fractional digit: `1000000000000000000` -> `1.0`, `1` -> `0.000000000000000001`.
    pub fn format_unsigned(&self, value: U256) -> String {
        if self.decimals == 0 {
            return value.to_string();
        }
        let scale = self.scale();
        let fraction = format!("{:0>width$}", (value % scale).to_string(), width = self.decimals as usize);
        let fraction = fraction.trim_end_matches('0');
        format!("{}.{}", value / scale, if fraction.is_empty() { "0" } else { fraction })
    }

    /// Formats signed fixed-point value, see [`Self::format_unsigned`].
    pub fn format_signed(&self, value: I256) -> String {
        let (sign, abs) = value.into_sign_and_abs();
        let formatted = self.format_unsigned(abs);
        if sign.is_negative() { format!("-{formatted}") } else { formatted }
    }

    /// Exact inverse of [`Self::format_unsigned`], also accepting values without
    /// fractional part.
    pub fn parse_unsigned(&self, value: &str) -> Result<U256, IndexerError> {
        let invalid = || IndexerError::InvalidArgument(format!("invalid decimal amount: {value:?}"));

        let (integer, fraction) = value.split_once('.').unwrap_or((value, ""));
        if integer.is_empty()
            || fraction.len() > self.decimals as usize
            || !integer.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        let digits = format!("{integer}{fraction:0<width$}", width = self.decimals as usize);
        U256::from_str_radix(&digits, 10).map_err(|_| invalid())
    }

    /// Exact inverse of [`Self::format_signed`].
    pub fn parse_signed(&self, value: &str) -> Result<I256, IndexerError> {
        let (sign, abs) = match value.strip_prefix('-') {
            Some(abs) => (Sign::Negative, abs),
            None => (Sign::Positive, value),
        };
        I256::checked_from_sign_and_abs(sign, self.parse_unsigned(abs)?).ok_or_else(|| {
            IndexerError::InvalidArgument(format!("decimal amount out of range: {value:?}"))
        })
    }

    /// Converts signed fixed-point value to decimal number.
    pub fn to_decimal(&self, value: I256) -> Result<D256, IndexerError> {
        self.format_signed(value)
            .parse::<D256>()
            .map_err(|err| IndexerError::Decode(format!("decimal conversion of {value}: {err}")))
    }

    /// Converts unsigned fixed-point value to decimal number.
    pub fn to_unsigned_decimal(&self, value: U256) -> Result<D256, IndexerError> {
        self.format_unsigned(value)
            .parse::<D256>()
            .map_err(|err| IndexerError::Decode(format!("decimal conversion of {value}: {err}")))
    }
}

/// Decodes a single 32-byte ABI word as two's-complement signed integer.
pub fn decode_int256(word: &[u8]) -> Result<I256, IndexerError> {
    if word.len() != 32 {
        return Err(IndexerError::Decode(format!(
            "expected 32-byte int256 word, got {} bytes",
            word.len()
        )));
    }
    Ok(I256::from_raw(U256::from_be_slice(word)))
}

/// Narrows a band index to `i64`.
pub fn band_index(value: I256) -> Result<i64, IndexerError> {
    i64::try_from(value).map_err(|_| IndexerError::Decode(format!("band index {value} out of range")))
}

/// Number of bands in the inclusive range `[lower, upper]`.
///
/// Inverted ranges and ranges wider than [`MAX_BAND_SPAN`] are malformed.
pub fn band_span(lower: i64, upper: i64) -> Result<u64, IndexerError> {
    if upper < lower {
        return Err(IndexerError::Decode(format!("inverted band range [{lower}, {upper}]")));
    }
    upper
        .abs_diff(lower)
        .checked_add(1)
        .filter(|span| *span <= MAX_BAND_SPAN)
        .ok_or_else(|| {
            IndexerError::Decode(format!(
                "band range [{lower}, {upper}] wider than {MAX_BAND_SPAN} bands"
            ))
        })
}
