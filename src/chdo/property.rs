use tracing::trace;

use super::decoder::DecodedUnit;
use super::field::{As, FieldValue};
use super::fields::{
    IS_ANOMALY, IS_CDR, IS_DATA_PADDED, IS_ECDR, IS_FRAME, IS_GIF_FRAME, IS_IDLE, IS_INVALID,
    IS_MONITOR_DATA, IS_OUT_OF_SYNC, IS_PACKET, IS_PACKET_FULL, IS_QQC_DATA, IS_TURBO,
};
use crate::dictionary::{EqualityClause, FieldSchema};
use crate::prelude::*;

fn parse_unsigned(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn parse_signed(s: &str) -> Option<i64> {
    match s.strip_prefix('-') {
        Some(magnitude) => i64::try_from(parse_unsigned(magnitude)?)
            .ok()
            .and_then(i64::checked_neg),
        None => i64::try_from(parse_unsigned(s)?).ok(),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Compare a decoded value with an expected value from the dictionary.
///
/// Integers accept decimal or `0x` hex, flags also accept `true`/`false`, text is compared
/// trimmed, and binary values as hex digits ignoring case.
fn equals(value: &FieldValue, expected: &str) -> bool {
    let expected = expected.trim();
    match value {
        FieldValue::Unsigned(v) => match parse_unsigned(expected) {
            Some(e) => e == *v,
            None => parse_bool(expected).is_some_and(|e| e == (*v != 0)),
        },
        FieldValue::Signed(v) => parse_signed(expected) == Some(*v),
        FieldValue::Float(v) => expected.parse::<f64>().is_ok_and(|e| e == *v),
        FieldValue::Boolean(v) => match parse_bool(expected) {
            Some(e) => e == *v,
            None => parse_unsigned(expected).is_some_and(|e| (e != 0) == *v),
        },
        FieldValue::Ascii(v) => v.trim() == expected,
        FieldValue::Bytes(_) => {
            let expected = expected
                .strip_prefix("0x")
                .or_else(|| expected.strip_prefix("0X"))
                .unwrap_or(expected);
            value.to_string().eq_ignore_ascii_case(expected)
        }
        FieldValue::Date(_) | FieldValue::Sclk(_) => value.to_string() == expected,
    }
}

/// As [equals], comparing 32 bit floating point fields at single precision.
#[allow(clippy::cast_possible_truncation)]
fn field_equals(field: &FieldSchema, value: &FieldValue, expected: &str) -> bool {
    match value {
        FieldValue::Float(v) if field.bit_length == 32 => expected
            .trim()
            .parse::<f32>()
            .is_ok_and(|e| e == *v as f32),
        _ => equals(value, expected),
    }
}

fn clause_holds(
    unit: &DecodedUnit,
    property: &str,
    chdo_type: u16,
    clause: &EqualityClause,
) -> Result<bool> {
    let Some(record) = unit.record(chdo_type) else {
        return Ok(false);
    };
    let Some(field) = record.schema.field(&clause.field) else {
        return Err(Error::UnknownField {
            property: property.to_string(),
            field: clause.field.clone(),
        });
    };
    let value = record.decode(field, As::natural(field.format))?;
    Ok(field_equals(field, &value, &clause.value) == clause.equal)
}

/// Evaluate a dictionary property against a decoded unit.
///
/// Conditions whose CHDO type was not decoded are skipped. The property is true if all
/// clauses of any remaining condition hold.
///
/// # Errors
/// [Error::UnknownProperty] if the dictionary does not define `name`, and
/// [Error::UnknownField] if an applicable clause names a field its CHDO does not define.
pub fn evaluate(unit: &DecodedUnit, name: &str) -> Result<bool> {
    let property = unit
        .dictionary()
        .property(name)
        .ok_or_else(|| Error::UnknownProperty(name.to_string()))?;

    for cond in &property.conditions {
        if !unit.has_record(cond.chdo_type) {
            trace!(property = name, chdo_type = cond.chdo_type, "condition not applicable");
            continue;
        }
        let mut satisfied = true;
        for clause in &cond.clauses {
            if !clause_holds(unit, name, cond.chdo_type, clause)? {
                satisfied = false;
                break;
            }
        }
        if satisfied {
            return Ok(true);
        }
    }
    Ok(false)
}

impl DecodedUnit {
    /// Evaluate a named property defined by this unit's dictionary.
    ///
    /// # Errors
    /// See [evaluate].
    pub fn property(&self, name: &str) -> Result<bool> {
        evaluate(self, name)
    }
}

macro_rules! named_properties {
    ($($(#[$meta:meta])* $fn:ident => $name:ident),* $(,)?) => {
        impl DecodedUnit {
            $(
                $(#[$meta])*
                ///
                /// # Errors
                /// See [evaluate].
                pub fn $fn(&self) -> Result<bool> {
                    evaluate(self, $name)
                }
            )*
        }
    };
}

named_properties! {
    is_frame => IS_FRAME,
    is_packet => IS_PACKET,
    is_out_of_sync => IS_OUT_OF_SYNC,
    is_idle => IS_IDLE,
    is_invalid => IS_INVALID,
    /// Channelized data record.
    is_cdr => IS_CDR,
    /// Extended channelized data record.
    is_ecdr => IS_ECDR,
    is_qqc_data => IS_QQC_DATA,
    is_monitor_data => IS_MONITOR_DATA,
    is_anomaly => IS_ANOMALY,
    is_data_padded => IS_DATA_PADDED,
    is_packet_full => IS_PACKET_FULL,
    is_turbo => IS_TURBO,
    is_gif_frame => IS_GIF_FRAME,
}
