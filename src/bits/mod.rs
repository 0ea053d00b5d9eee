//! Bit granular access to byte buffers.
//!
//! [BitCursor] reads fields that need not start or end on a byte boundary. Bits are always
//! extracted most-significant-bit first from the underlying bytes; the configured
//! [ByteOrder] only controls how the extracted bits are assembled into a value.
mod mil1750;

pub use mil1750::{decode_mil32, decode_mil48, MIL32_LEN, MIL48_LEN};

use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// How extracted bits are assembled into multi-byte values.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    #[default]
    BigEndian,
    /// The first extracted 8-bit group is least significant. When the width is not a
    /// multiple of 8 the final, short group is the most significant.
    LittleEndian,
}

/// Representation of signed integer fields.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignRepr {
    #[default]
    TwosComplement,
    SignMagnitude,
}

/// Sequential, bit granular reader over a byte slice.
///
/// # Example
/// ```
/// use sfdu::bits::{BitCursor, SignRepr};
///
/// let dat: &[u8] = &[0b1011_0011, 0b1100_0000];
/// let mut cursor = BitCursor::new(dat);
/// assert_eq!(cursor.read_unsigned(3).unwrap(), 0b101);
/// assert_eq!(cursor.read_signed(4, SignRepr::TwosComplement).unwrap(), -7);
/// assert_eq!(cursor.remaining_bits(), 9);
/// ```
#[derive(Debug, Clone)]
pub struct BitCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    limit: usize,
    mark: Option<usize>,
    order: ByteOrder,
}

impl<'a> BitCursor<'a> {
    /// Widest integer that can be read at once.
    pub const MAX_WIDTH: usize = 64;

    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        BitCursor {
            buf,
            pos: 0,
            limit: buf.len() * 8,
            mark: None,
            order: ByteOrder::BigEndian,
        }
    }

    #[must_use]
    pub fn with_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    pub fn set_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    #[must_use]
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Current position in bits from the start of the buffer.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Buffer length in bits.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub fn remaining_bits(&self) -> usize {
        self.limit - self.pos
    }

    #[must_use]
    pub fn is_byte_aligned(&self) -> bool {
        self.pos % 8 == 0
    }

    /// Move to an absolute bit position. Moving backwards is allowed.
    ///
    /// # Errors
    /// [Error::InvalidArgument] if `bits` is beyond the limit.
    pub fn set_position(&mut self, bits: usize) -> Result<()> {
        if bits > self.limit {
            return Err(Error::InvalidArgument(format!(
                "position {bits} is beyond limit {}",
                self.limit
            )));
        }
        self.pos = bits;
        Ok(())
    }

    /// Advance by `bits` without reading.
    ///
    /// # Errors
    /// [Error::BufferUnderflow] if fewer than `bits` remain.
    pub fn skip(&mut self, bits: usize) -> Result<()> {
        self.require(bits)?;
        self.pos += bits;
        Ok(())
    }

    /// Remember the current position for a later [BitCursor::reset].
    pub fn mark(&mut self) {
        self.mark = Some(self.pos);
    }

    /// Return to the marked position.
    ///
    /// # Errors
    /// [Error::InvalidArgument] if no mark has been set.
    pub fn reset(&mut self) -> Result<()> {
        let Some(mark) = self.mark else {
            return Err(Error::InvalidArgument("reset without mark".to_string()));
        };
        self.pos = mark;
        Ok(())
    }

    fn require(&self, bits: usize) -> Result<()> {
        if bits > self.remaining_bits() {
            return Err(Error::underflow(bits, self.remaining_bits()));
        }
        Ok(())
    }

    fn check_width(n: usize, max: usize) -> Result<()> {
        if n == 0 || n > max {
            return Err(Error::InvalidArgument(format!(
                "bit width must be between 1 and {max}; got {n}"
            )));
        }
        Ok(())
    }

    // Caller must have checked width and remaining bits.
    fn take_be(&mut self, n: usize) -> u64 {
        let mut acc = 0u64;
        let mut left = n;
        while left > 0 {
            let byte = u64::from(self.buf[self.pos / 8]);
            let avail = 8 - self.pos % 8;
            let take = avail.min(left);
            let chunk = (byte >> (avail - take)) & ((1u64 << take) - 1);
            acc = (acc << take) | chunk;
            self.pos += take;
            left -= take;
        }
        acc
    }

    fn take_le(&mut self, n: usize) -> u64 {
        let mut acc = 0u64;
        let mut shift = 0;
        let mut left = n;
        while left > 0 {
            let width = left.min(8);
            acc |= self.take_be(width) << shift;
            shift += 8;
            left -= width;
        }
        acc
    }

    /// Read an `n` bit unsigned value using the configured byte order.
    ///
    /// # Errors
    /// [Error::InvalidArgument] if `n` is not in `1..=64`, [Error::BufferUnderflow] if
    /// fewer than `n` bits remain.
    pub fn read_unsigned(&mut self, n: usize) -> Result<u64> {
        Self::check_width(n, Self::MAX_WIDTH)?;
        self.require(n)?;
        Ok(match self.order {
            ByteOrder::BigEndian => self.take_be(n),
            ByteOrder::LittleEndian => self.take_le(n),
        })
    }

    /// Read an `n` bit signed value.
    ///
    /// # Errors
    /// See [BitCursor::read_unsigned].
    pub fn read_signed(&mut self, n: usize, repr: SignRepr) -> Result<i64> {
        let raw = self.read_unsigned(n)?;
        Ok(to_signed(raw, n, repr))
    }

    /// Read at most 8 bits.
    ///
    /// # Errors
    /// [Error::InvalidArgument] if `n` is not in `1..=8`, otherwise as
    /// [BitCursor::read_unsigned].
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_u8(&mut self, n: usize) -> Result<u8> {
        Self::check_width(n, 8)?;
        Ok(self.read_unsigned(n)? as u8)
    }

    /// Read at most 16 bits.
    ///
    /// # Errors
    /// [Error::InvalidArgument] if `n` is not in `1..=16`, otherwise as
    /// [BitCursor::read_unsigned].
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_u16(&mut self, n: usize) -> Result<u16> {
        Self::check_width(n, 16)?;
        Ok(self.read_unsigned(n)? as u16)
    }

    /// Read at most 32 bits.
    ///
    /// # Errors
    /// [Error::InvalidArgument] if `n` is not in `1..=32`, otherwise as
    /// [BitCursor::read_unsigned].
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_u32(&mut self, n: usize) -> Result<u32> {
        Self::check_width(n, 32)?;
        Ok(self.read_unsigned(n)? as u32)
    }

    /// Read at most 8 bits as a signed value.
    ///
    /// # Errors
    /// As [BitCursor::read_u8].
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_i8(&mut self, n: usize, repr: SignRepr) -> Result<i8> {
        Self::check_width(n, 8)?;
        Ok(self.read_signed(n, repr)? as i8)
    }

    /// Read at most 16 bits as a signed value.
    ///
    /// # Errors
    /// As [BitCursor::read_u16].
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_i16(&mut self, n: usize, repr: SignRepr) -> Result<i16> {
        Self::check_width(n, 16)?;
        Ok(self.read_signed(n, repr)? as i16)
    }

    /// Read at most 32 bits as a signed value.
    ///
    /// # Errors
    /// As [BitCursor::read_u32].
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_i32(&mut self, n: usize, repr: SignRepr) -> Result<i32> {
        Self::check_width(n, 32)?;
        Ok(self.read_signed(n, repr)? as i32)
    }

    /// # Errors
    /// [Error::BufferUnderflow] if no bits remain.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_unsigned(1)? != 0)
    }

    /// # Errors
    /// [Error::BufferUnderflow] if fewer than 32 bits remain.
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_unsigned(32)? as u32))
    }

    /// # Errors
    /// [Error::BufferUnderflow] if fewer than 64 bits remain.
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_unsigned(64)?))
    }

    /// MIL-STD-1750A single precision. Always big-endian.
    ///
    /// # Errors
    /// [Error::BufferUnderflow] if fewer than 4 bytes remain.
    pub fn read_mil32(&mut self) -> Result<f64> {
        let mut buf = [0u8; MIL32_LEN];
        self.fill(&mut buf)?;
        Ok(decode_mil32(buf))
    }

    /// MIL-STD-1750A extended precision. Always big-endian.
    ///
    /// # Errors
    /// [Error::BufferUnderflow] if fewer than 6 bytes remain.
    pub fn read_mil48(&mut self) -> Result<f64> {
        let mut buf = [0u8; MIL48_LEN];
        self.fill(&mut buf)?;
        Ok(decode_mil48(buf))
    }

    /// Fill `dst` with the next `dst.len()` bytes. Byte order does not apply.
    ///
    /// # Errors
    /// [Error::BufferUnderflow] if not enough bytes remain.
    #[allow(clippy::cast_possible_truncation)]
    pub fn fill(&mut self, dst: &mut [u8]) -> Result<()> {
        self.require(dst.len() * 8)?;
        if self.is_byte_aligned() {
            let start = self.pos / 8;
            dst.copy_from_slice(&self.buf[start..start + dst.len()]);
            self.pos += dst.len() * 8;
        } else {
            for b in dst.iter_mut() {
                *b = self.take_be(8) as u8;
            }
        }
        Ok(())
    }

    /// Copy the next `len` bytes.
    ///
    /// # Errors
    /// [Error::BufferUnderflow] if not enough bytes remain.
    pub fn read_raw(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    /// Read `len` bytes as ASCII. Non-ASCII bytes become U+FFFD.
    ///
    /// # Errors
    /// [Error::BufferUnderflow] if not enough bytes remain.
    pub fn read_ascii(&mut self, len: usize) -> Result<String> {
        let raw = self.read_raw(len)?;
        Ok(raw
            .iter()
            .map(|&b| {
                if b.is_ascii() {
                    char::from(b)
                } else {
                    char::REPLACEMENT_CHARACTER
                }
            })
            .collect())
    }

    /// Read `len` bytes as UTF-8, replacing invalid sequences.
    ///
    /// # Errors
    /// [Error::BufferUnderflow] if not enough bytes remain.
    pub fn read_utf8(&mut self, len: usize) -> Result<String> {
        let raw = self.read_raw(len)?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

/// Interpret the low `n` bits of `raw` as a signed value.
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn to_signed(raw: u64, n: usize, repr: SignRepr) -> i64 {
    match repr {
        SignRepr::TwosComplement => {
            let shift = 64 - n;
            ((raw << shift) as i64) >> shift
        }
        SignRepr::SignMagnitude => {
            let sign = 1u64 << (n - 1);
            if raw & sign == 0 {
                raw as i64
            } else {
                -((raw & !sign) as i64)
            }
        }
    }
}
