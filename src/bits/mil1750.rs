//! MIL-STD-1750A floating point.
//!
//! Single precision is a 24-bit two's complement fractional mantissa followed by an 8-bit
//! two's complement exponent. Extended precision inserts 16 more mantissa bits after the
//! exponent byte. The value is `mantissa * 2^exponent` where the mantissa is a fraction
//! in `[-1, 1)`.

/// Number of bytes in a single precision value.
pub const MIL32_LEN: usize = 4;
/// Number of bytes in an extended precision value.
pub const MIL48_LEN: usize = 6;

#[must_use]
pub fn decode_mil32(buf: [u8; MIL32_LEN]) -> f64 {
    // arithmetic shift keeps the mantissa sign
    let mantissa = i32::from_be_bytes([buf[0], buf[1], buf[2], 0]) >> 8;
    let exponent = i32::from(buf[3] as i8);
    f64::from(mantissa) * 2f64.powi(exponent - 23)
}

#[must_use]
pub fn decode_mil48(buf: [u8; MIL48_LEN]) -> f64 {
    let hi = i64::from(i32::from_be_bytes([buf[0], buf[1], buf[2], 0]) >> 8);
    let lo = i64::from(u16::from_be_bytes([buf[4], buf[5]]));
    let mantissa = (hi << 16) | lo;
    let exponent = i32::from(buf[3] as i8);
    // 40 significant bits, exact in an f64
    #[allow(clippy::cast_precision_loss)]
    let mantissa = mantissa as f64;
    mantissa * 2f64.powi(exponent - 39)
}
