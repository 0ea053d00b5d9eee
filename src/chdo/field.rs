use std::fmt::Display;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use tracing::warn;

use crate::bits::BitCursor;
use crate::dictionary::{FieldFormat, FieldSchema, RecordSchema};
use crate::prelude::*;

/// Days between the 1958 station epoch and the Unix epoch.
const DAYS_1958_TO_1970: i64 = 4383;
const MILLIS_PER_DAY: i64 = 86_400_000;

/// Requested interpretation of a field's bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum As {
    Unsigned,
    Signed,
    Float,
    Ascii,
    Date,
    Sclk,
    /// Unsigned value != 0.
    Boolean,
    Bytes,
}

impl As {
    /// Natural interpretation of a field format.
    #[must_use]
    pub fn natural(format: FieldFormat) -> Self {
        match format {
            FieldFormat::UnsignedInt | FieldFormat::Flag => As::Unsigned,
            FieldFormat::SignedInt | FieldFormat::SignMagnitudeInt => As::Signed,
            FieldFormat::Float | FieldFormat::Mil1750a => As::Float,
            FieldFormat::Date => As::Date,
            FieldFormat::Sclk => As::Sclk,
            FieldFormat::Ascii => As::Ascii,
            FieldFormat::Binary => As::Bytes,
        }
    }
}

/// Spacecraft clock with a 32-bit coarse and an 8 or 16 bit fine component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sclk {
    pub coarse: u32,
    pub fine: u16,
    /// Width of `fine` in bits.
    pub fine_bits: u8,
}

impl Sclk {
    /// Clock value in coarse ticks.
    #[must_use]
    pub fn as_seconds(&self) -> f64 {
        f64::from(self.coarse) + f64::from(self.fine) / 2f64.powi(i32::from(self.fine_bits))
    }
}

impl Display for Sclk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.fine_bits <= 8 {
            write!(f, "{}.{:03}", self.coarse, self.fine)
        } else {
            write!(f, "{}.{:05}", self.coarse, self.fine)
        }
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Ascii(String),
    Date(DateTime<Utc>),
    Sclk(Sclk),
    Boolean(bool),
    Bytes(Vec<u8>),
}

impl FieldValue {
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::Unsigned(v) => Some(*v),
            FieldValue::Signed(v) => u64::try_from(*v).ok(),
            FieldValue::Boolean(v) => Some(u64::from(*v)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Signed(v) => Some(*v),
            FieldValue::Unsigned(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Ascii(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Date(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sclk(&self) -> Option<Sclk> {
        match self {
            FieldValue::Sclk(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(v) => Some(*v),
            FieldValue::Unsigned(v) => Some(*v != 0),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(v) => Some(v),
            _ => None,
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Unsigned(v) => write!(f, "{v}"),
            FieldValue::Signed(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Ascii(v) => f.write_str(v),
            FieldValue::Date(v) => write!(f, "{}", v.format("%Y-%jT%H:%M:%S%.3f")),
            FieldValue::Sclk(v) => write!(f, "{v}"),
            FieldValue::Boolean(v) => write!(f, "{v}"),
            FieldValue::Bytes(v) => {
                for b in v {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// Cursor positioned at the start of `field` within the record data, plus the field width
/// in bits.
fn locate<'a>(
    data: &'a [u8],
    schema: &RecordSchema,
    field: &FieldSchema,
) -> Result<(BitCursor<'a>, usize)> {
    let data = match schema.byte_size() {
        Some(size) if size < data.len() => &data[..size],
        _ => data,
    };
    let mut cursor = BitCursor::new(data).with_order(field.byte_order);
    if field.start_bit() > cursor.limit() {
        return Err(Error::underflow(
            field.start_bit() + field.bit_length,
            cursor.limit(),
        ));
    }
    cursor.set_position(field.start_bit())?;
    let width = if field.bit_length == 0 {
        cursor.remaining_bits()
    } else {
        field.bit_length
    };
    if width > cursor.remaining_bits() {
        return Err(Error::underflow(width, cursor.remaining_bits()));
    }
    Ok((cursor, width))
}

fn require_aligned(field: &FieldSchema, width: usize, kind: &str) -> Result<()> {
    if field.bit_offset != 0 || width % 8 != 0 {
        return Err(Error::InvalidArgument(format!(
            "{kind} field {} must be byte aligned and a whole number of bytes",
            field.id
        )));
    }
    Ok(())
}

/// Decode `field` from the data portion (after the type and length header) of a record.
pub(crate) fn decode(
    data: &[u8],
    schema: &RecordSchema,
    field: &FieldSchema,
    kind: As,
) -> Result<FieldValue> {
    let (mut cursor, width) = locate(data, schema, field)?;

    let value = match kind {
        As::Unsigned => FieldValue::Unsigned(cursor.read_unsigned(width)?),
        As::Boolean => FieldValue::Boolean(cursor.read_unsigned(width)? != 0),
        As::Signed => FieldValue::Signed(cursor.read_signed(width, field.format.sign_repr())?),
        As::Float => FieldValue::Float(read_float(&mut cursor, field, width)?),
        As::Ascii => {
            require_aligned(field, width, "ASCII")?;
            let text = cursor.read_ascii(width / 8)?;
            FieldValue::Ascii(text.trim_end_matches('\0').to_string())
        }
        As::Bytes => {
            require_aligned(field, width, "byte array")?;
            FieldValue::Bytes(cursor.read_raw(width / 8)?)
        }
        As::Date => {
            require_aligned(field, width, "date")?;
            FieldValue::Date(read_date(&mut cursor, data, schema, field, width)?)
        }
        As::Sclk => {
            require_aligned(field, width, "SCLK")?;
            let coarse = cursor.read_u32(32)?;
            let (fine, fine_bits) = match width {
                40 => (u16::from(cursor.read_u8(8)?), 8),
                48 => (cursor.read_u16(16)?, 16),
                _ => {
                    return Err(Error::InvalidArgument(format!(
                        "SCLK field {} must be 40 or 48 bits, not {width}",
                        field.id
                    )))
                }
            };
            FieldValue::Sclk(Sclk {
                coarse,
                fine,
                fine_bits,
            })
        }
    };
    Ok(value)
}

#[allow(clippy::cast_precision_loss)]
fn read_float(cursor: &mut BitCursor, field: &FieldSchema, width: usize) -> Result<f64> {
    match (field.format, width) {
        (FieldFormat::Mil1750a, 32) => cursor.read_mil32(),
        (FieldFormat::Mil1750a, 48) => cursor.read_mil48(),
        (FieldFormat::UnsignedInt, _) => Ok(cursor.read_unsigned(width)? as f64),
        (FieldFormat::SignedInt | FieldFormat::SignMagnitudeInt, _) => {
            Ok(cursor.read_signed(width, field.format.sign_repr())? as f64)
        }
        (_, 32) => {
            require_aligned(field, width, "floating point")?;
            Ok(f64::from(cursor.read_f32()?))
        }
        (_, 64) => {
            require_aligned(field, width, "floating point")?;
            cursor.read_f64()
        }
        _ => Err(Error::InvalidArgument(format!(
            "floating point field {} has unsupported width {width}",
            field.id
        ))),
    }
}

fn clamp_to_unix_epoch(time: DateTime<Utc>) -> DateTime<Utc> {
    time.max(DateTime::UNIX_EPOCH)
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis.max(0))
        .ok_or_else(|| Error::InvalidArgument(format!("time out of range: {millis}ms")))
}

/// Boolean companion flag in the same record; absent flags read as false.
fn companion_flag(data: &[u8], schema: &RecordSchema, name: &str) -> Result<bool> {
    match schema.field(name) {
        Some(field) => Ok(decode(data, schema, field, As::Boolean)?
            .as_bool()
            .unwrap_or_default()),
        None => {
            warn!(field = name, "boolean field not defined; using false");
            Ok(false)
        }
    }
}

fn read_date(
    cursor: &mut BitCursor,
    data: &[u8],
    schema: &RecordSchema,
    field: &FieldSchema,
    width: usize,
) -> Result<DateTime<Utc>> {
    match width {
        48 | 64 => {
            let days = i64::from(cursor.read_u16(16)?);
            let millis = i64::from(cursor.read_u32(32)?);
            let time =
                millis_to_datetime((days - DAYS_1958_TO_1970) * MILLIS_PER_DAY + millis)?;
            if width == 48 {
                return Ok(time);
            }

            let extension = i64::from(cursor.read_u16(16)?);
            let ext_flag = format!("{}_extended_resolution", field.id);
            if !schema.has_field(&ext_flag) || !companion_flag(data, schema, &ext_flag)? {
                return Ok(time);
            }
            let tenths_of_micros =
                companion_flag(data, schema, &format!("{}_ext_res_units", field.id))?;
            let nanos = if tenths_of_micros {
                extension * 100
            } else {
                extension * 1000
            };
            Ok(time + Duration::nanoseconds(nanos))
        }
        96 => {
            let year = cursor.read_u16(16)?;
            let day_of_year = cursor.read_u16(16)?;
            let seconds = cursor.read_f64()?;
            let midnight = NaiveDate::from_yo_opt(i32::from(year), u32::from(day_of_year))
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "invalid year/day-of-year {year}/{day_of_year} in field {}",
                        field.id
                    ))
                })?;
            if !seconds.is_finite() || !(0.0..=86_401.0).contains(&seconds) {
                return Err(Error::InvalidArgument(format!(
                    "invalid seconds of day {seconds} in field {}",
                    field.id
                )));
            }
            #[allow(clippy::cast_possible_truncation)]
            let millis = (seconds * 1000.0).round() as i64;
            let time = Utc.from_utc_datetime(&midnight) + Duration::milliseconds(millis);
            Ok(clamp_to_unix_epoch(time))
        }
        _ => Err(Error::InvalidArgument(format!(
            "date field {} must be 48, 64, or 96 bits, not {width}",
            field.id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::ByteOrder;
    use crate::dictionary::Classification;

    fn schema(fields: Vec<FieldSchema>) -> RecordSchema {
        RecordSchema::new(5, "test", Classification::Secondary, None, fields).unwrap()
    }

    fn field(id: &str, byte_offset: usize, bit_length: usize, format: FieldFormat) -> FieldSchema {
        FieldSchema::builder()
            .id(id)
            .byte_offset(byte_offset)
            .bit_length(bit_length)
            .format(format)
            .build()
    }

    fn value(data: &[u8], schema: &RecordSchema, id: &str, kind: As) -> Result<FieldValue> {
        decode(data, schema, schema.field(id).unwrap(), kind)
    }

    #[test]
    fn unsigned_at_bit_offset() {
        let s = schema(vec![FieldSchema::builder()
            .id("vcid")
            .byte_offset(1)
            .bit_offset(2)
            .bit_length(6)
            .format(FieldFormat::UnsignedInt)
            .build()]);
        let val = value(&[0xff, 0b0010_1101], &s, "vcid", As::Unsigned).unwrap();
        assert_eq!(val, FieldValue::Unsigned(0b10_1101));
    }

    #[test]
    fn little_endian_field() {
        let s = schema(vec![FieldSchema::builder()
            .id("count")
            .bit_length(16)
            .format(FieldFormat::UnsignedInt)
            .byte_order(ByteOrder::LittleEndian)
            .build()]);
        let val = value(&[0x12, 0x34], &s, "count", As::Unsigned).unwrap();
        assert_eq!(val, FieldValue::Unsigned(0x3412));
    }

    #[test]
    fn sign_magnitude_field() {
        let s = schema(vec![field("offset", 0, 8, FieldFormat::SignMagnitudeInt)]);
        let val = value(&[0x85], &s, "offset", As::Signed).unwrap();
        assert_eq!(val, FieldValue::Signed(-5));
    }

    #[test]
    fn variable_length_runs_to_end_of_record() {
        let s = schema(vec![field("text", 1, 0, FieldFormat::Ascii)]);
        let val = value(b"xDSS-14\0", &s, "text", As::Ascii).unwrap();
        assert_eq!(val, FieldValue::Ascii("DSS-14".to_string()));
    }

    #[test]
    fn variable_length_is_bounded_by_byte_size() {
        let s = RecordSchema::new(
            5,
            "test",
            Classification::Secondary,
            Some(3),
            vec![field("raw", 1, 0, FieldFormat::Binary)],
        )
        .unwrap();
        let val = value(&[1, 2, 3, 4, 5], &s, "raw", As::Bytes).unwrap();
        assert_eq!(val, FieldValue::Bytes(vec![2, 3]));
        assert_eq!(val.to_string(), "0203");
    }

    #[test]
    fn field_beyond_record_underflows() {
        let s = schema(vec![field("x", 2, 16, FieldFormat::UnsignedInt)]);
        let zult = value(&[0, 0, 0], &s, "x", As::Unsigned);
        assert!(matches!(zult, Err(Error::BufferUnderflow { .. })), "{zult:?}");
    }

    #[test]
    fn unaligned_bytes_are_rejected() {
        let s = schema(vec![FieldSchema::builder()
            .id("x")
            .bit_offset(4)
            .bit_length(8)
            .format(FieldFormat::Binary)
            .build()]);
        let zult = value(&[0, 0], &s, "x", As::Bytes);
        assert!(matches!(zult, Err(Error::InvalidArgument(_))), "{zult:?}");
    }

    #[test]
    fn ieee_and_mil_floats() {
        let s = schema(vec![
            field("f32", 0, 32, FieldFormat::Float),
            field("mil", 4, 32, FieldFormat::Mil1750a),
        ]);
        let mut data = 1.5f32.to_be_bytes().to_vec();
        data.extend_from_slice(&[0x60, 0x00, 0x00, 0x04]);

        assert_eq!(
            value(&data, &s, "f32", As::Float).unwrap(),
            FieldValue::Float(1.5)
        );
        assert_eq!(
            value(&data, &s, "mil", As::Float).unwrap(),
            FieldValue::Float(12.0)
        );
    }

    #[test]
    fn date_48() {
        let s = schema(vec![field("ert", 0, 48, FieldFormat::Date)]);
        // 1970-01-02 plus 1.5s
        let days = u16::try_from(DAYS_1958_TO_1970 + 1).unwrap();
        let mut data = days.to_be_bytes().to_vec();
        data.extend_from_slice(&1500u32.to_be_bytes());

        let date = value(&data, &s, "ert", As::Date).unwrap().as_date().unwrap();
        assert_eq!(date.timestamp_millis(), MILLIS_PER_DAY + 1500);
    }

    #[test]
    fn date_before_1970_is_clamped() {
        let s = schema(vec![field("ert", 0, 48, FieldFormat::Date)]);
        let data = [0u8; 6];
        let date = value(&data, &s, "ert", As::Date).unwrap().as_date().unwrap();
        assert_eq!(date, DateTime::UNIX_EPOCH);
    }

    fn date64(extended: u8, units: u8) -> DateTime<Utc> {
        let s = schema(vec![
            field("ert", 0, 64, FieldFormat::Date),
            field("ert_extended_resolution", 8, 8, FieldFormat::Flag),
            field("ert_ext_res_units", 9, 8, FieldFormat::Flag),
        ]);
        let days = u16::try_from(DAYS_1958_TO_1970).unwrap();
        let mut data = days.to_be_bytes().to_vec();
        data.extend_from_slice(&10u32.to_be_bytes());
        data.extend_from_slice(&250u16.to_be_bytes());
        data.extend_from_slice(&[extended, units]);
        value(&data, &s, "ert", As::Date).unwrap().as_date().unwrap()
    }

    #[test]
    fn date_64_extension() {
        assert_eq!(date64(0, 0).timestamp_nanos_opt(), Some(10_000_000));
        assert_eq!(
            date64(1, 0).timestamp_nanos_opt(),
            Some(10_000_000 + 250_000),
            "microseconds"
        );
        assert_eq!(
            date64(1, 1).timestamp_nanos_opt(),
            Some(10_000_000 + 25_000),
            "tenths of microseconds"
        );
    }

    #[test]
    fn date_96() {
        let s = schema(vec![field("ert", 0, 96, FieldFormat::Date)]);
        let mut data = 2020u16.to_be_bytes().to_vec();
        data.extend_from_slice(&32u16.to_be_bytes());
        data.extend_from_slice(&3661.25f64.to_be_bytes());

        let date = value(&data, &s, "ert", As::Date).unwrap().as_date().unwrap();
        assert_eq!(
            FieldValue::Date(date).to_string(),
            "2020-032T01:01:01.250"
        );
    }

    #[test]
    fn bad_date_width() {
        let s = schema(vec![field("ert", 0, 32, FieldFormat::Date)]);
        let zult = value(&[0; 4], &s, "ert", As::Date);
        assert!(matches!(zult, Err(Error::InvalidArgument(_))), "{zult:?}");
    }

    #[test]
    fn sclk_40_and_48() {
        let s = schema(vec![
            field("sclk40", 0, 40, FieldFormat::Sclk),
            field("sclk48", 5, 48, FieldFormat::Sclk),
        ]);
        let data = [0, 0, 0x01, 0x00, 0x80, 0, 0, 0x01, 0x00, 0x80, 0x00];

        let sclk = value(&data, &s, "sclk40", As::Sclk)
            .unwrap()
            .as_sclk()
            .unwrap();
        assert_eq!(sclk.coarse, 256);
        assert_eq!(sclk.fine, 0x80);
        assert_eq!(sclk.as_seconds(), 256.5);
        assert_eq!(sclk.to_string(), "256.128");

        let sclk = value(&data, &s, "sclk48", As::Sclk)
            .unwrap()
            .as_sclk()
            .unwrap();
        assert_eq!(sclk.fine, 0x8000);
        assert_eq!(sclk.as_seconds(), 256.5);
        assert_eq!(sclk.to_string(), "256.32768");
    }

    #[test]
    fn boolean_is_nonzero() {
        let s = schema(vec![field("flag", 0, 3, FieldFormat::Flag)]);
        assert_eq!(
            value(&[0b0100_0000], &s, "flag", As::Boolean).unwrap(),
            FieldValue::Boolean(true)
        );
        assert_eq!(
            value(&[0b0001_1111], &s, "flag", As::Boolean).unwrap(),
            FieldValue::Boolean(false)
        );
    }
}
