//! Arbitrary-precision integers
//!
//! Magnitudes are little-endian `u32` limbs. A normalized value has no high
//! zero limbs, and zero is never negative, so structural equality is value
//! equality.

use std::fmt;

use thiserror::Error;

/// Arbitrary-precision signed integer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Bigint {
    negative: bool,
    digits: Vec<u32>,
}

/// Text that is not a valid hexadecimal integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid hexadecimal digit string")]
pub struct ParseHexError;

impl Bigint {
    /// Build from sign and little-endian limbs
    pub fn from_parts(negative: bool, digits: Vec<u32>) -> Self {
        let mut value = Bigint { negative, digits };
        value.normalize();
        value
    }

    /// Build from a machine integer
    pub fn from_i128(value: i128) -> Self {
        let negative = value < 0;
        let mut magnitude = value.unsigned_abs();
        let mut digits = Vec::new();
        while magnitude != 0 {
            digits.push(magnitude as u32);
            magnitude >>= 32;
        }
        Bigint::from_parts(negative, digits)
    }

    /// True for a negative value
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// True for zero
    pub fn is_zero(&self) -> bool {
        self.digits.is_empty()
    }

    /// Little-endian magnitude limbs
    pub fn digits(&self) -> &[u32] {
        &self.digits
    }

    /// Lowercase hexadecimal magnitude without prefix (`"0"` for zero)
    pub fn magnitude_hex(&self) -> String {
        let Some((top, rest)) = self.digits.split_last() else {
            return "0".to_string();
        };
        let mut text = format!("{top:x}");
        for limb in rest.iter().rev() {
            text.push_str(&format!("{limb:08x}"));
        }
        text
    }

    /// Parse a magnitude written by [`Bigint::magnitude_hex`]
    pub fn from_magnitude_hex(negative: bool, text: &[u8]) -> Result<Self, ParseHexError> {
        if text.is_empty() {
            return Err(ParseHexError);
        }
        let mut digits = Vec::with_capacity(text.len() / 8 + 1);
        for chunk in text.rchunks(8) {
            let mut limb = 0u32;
            for &c in chunk {
                let nibble = (c as char).to_digit(16).ok_or(ParseHexError)?;
                limb = (limb << 4) | nibble;
            }
            digits.push(limb);
        }
        Ok(Bigint::from_parts(negative, digits))
    }

    fn normalize(&mut self) {
        while self.digits.last() == Some(&0) {
            self.digits.pop();
        }
        if self.digits.is_empty() {
            self.negative = false;
        }
    }
}

impl fmt::Display for Bigint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.negative { "-" } else { "" };
        write!(f, "{sign}0x{}", self.magnitude_hex())
    }
}
