//! Byte stream primitives
//!
//! ## Encoding
//!
//! - Varints are unsigned LEB128, at most 10 bytes for a `u64`
//! - Signed integers are zigzag-mapped, then varint-encoded
//! - Fixed-width values are little-endian
//! - Booleans are one byte, `0` or `1`

use crate::error::{Result, SnapshotError};

/// Longest LEB128 encoding of a `u64`
pub const MAX_VARINT_LEN: usize = 10;

/// Encode a u64 as a variable-length integer (LEB128).
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a varint from a byte slice, returning (value, bytes_consumed).
///
/// `None` means the slice ended first; `Some(Err(()))` means the encoding
/// does not fit in 64 bits.
pub fn decode_varint(data: &[u8]) -> Option<std::result::Result<(u64, usize), ()>> {
    let mut value: u64 = 0;
    for (i, &byte) in data.iter().enumerate().take(MAX_VARINT_LEN) {
        let low = (byte & 0x7F) as u64;
        if i == MAX_VARINT_LEN - 1 && low > 1 {
            return Some(Err(()));
        }
        value |= low << (7 * i);
        if byte & 0x80 == 0 {
            return Some(Ok((value, i + 1)));
        }
    }
    if data.len() >= MAX_VARINT_LEN {
        Some(Err(()))
    } else {
        None
    }
}

/// Map a signed integer onto the unsigned range, small magnitudes first
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`]
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Append-only output buffer
#[derive(Debug, Default)]
pub struct StreamWriter {
    buf: Vec<u8>,
}

impl StreamWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing was written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Written bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Take the written bytes
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Write one byte
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Write a signed byte
    pub fn write_i8(&mut self, value: i8) {
        self.buf.push(value as u8);
    }

    /// Write a boolean as one byte
    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    /// Write a little-endian u16
    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a little-endian u32
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a little-endian i64
    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a little-endian f64
    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write an unsigned varint
    pub fn write_varint(&mut self, value: u64) {
        encode_varint(value, &mut self.buf);
    }

    /// Write a zigzag varint
    pub fn write_zigzag(&mut self, value: i64) {
        encode_varint(zigzag_encode(value), &mut self.buf);
    }

    /// Write a length prefix
    pub fn write_len(&mut self, len: usize) {
        self.write_varint(len as u64);
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

/// Cursor over an input slice
#[derive(Debug, Clone)]
pub struct StreamReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StreamReader<'a> {
    /// Create a reader at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        StreamReader { data, pos: 0 }
    }

    /// Current offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Unread byte count
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// True when every byte was consumed
    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(SnapshotError::UnexpectedEof {
                offset: self.pos,
                needed: len,
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a signed byte
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read a boolean byte; anything but 0 or 1 is corrupt
    pub fn read_bool(&mut self) -> Result<bool> {
        let offset = self.pos;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(SnapshotError::corrupt(
                offset,
                format!("invalid boolean byte {other}"),
            )),
        }
    }

    /// Read a little-endian u16
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian u32
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian i64
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian f64
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Read an unsigned varint
    pub fn read_varint(&mut self) -> Result<u64> {
        let offset = self.pos;
        match decode_varint(&self.data[self.pos..]) {
            Some(Ok((value, used))) => {
                self.pos += used;
                Ok(value)
            }
            Some(Err(())) => Err(SnapshotError::corrupt(offset, "varint overflows 64 bits")),
            None => Err(SnapshotError::UnexpectedEof {
                offset,
                needed: self.remaining() + 1,
            }),
        }
    }

    /// Read a varint that must fit in a u32
    pub fn read_varint_u32(&mut self) -> Result<u32> {
        let offset = self.pos;
        let value = self.read_varint()?;
        u32::try_from(value)
            .map_err(|_| SnapshotError::corrupt(offset, format!("{value} exceeds 32 bits")))
    }

    /// Read a zigzag varint
    pub fn read_zigzag(&mut self) -> Result<i64> {
        Ok(zigzag_decode(self.read_varint()?))
    }

    /// Read a length prefix bounded by `limit`
    pub fn read_len(&mut self, limit: u64) -> Result<usize> {
        let length = self.read_varint()?;
        if length > limit {
            return Err(SnapshotError::LengthLimit { length, limit });
        }
        usize::try_from(length).map_err(|_| SnapshotError::LengthLimit {
            length,
            limit: usize::MAX as u64,
        })
    }
}
