use std::{collections::HashMap, sync::Arc};

use serde::Serialize;
use tracing::{debug, span, trace, warn, Level};

use super::field::{self, As, FieldValue, Sclk};
use super::fields::{FORMAT, MAJOR, MINOR, MISSION_ID};
use super::label::{Label, LabelKind, LABEL_LEN};
use super::message::{parse_body, ControlMessage, MessageKind};
use crate::bits::BitCursor;
use crate::dictionary::{Classification, Dictionary, FieldSchema, RecordSchema, ANCHOR_LEN};
use crate::prelude::*;

/// Length of the type and length header preceding every CHDO.
pub const CHDO_HEADER_LEN: usize = 4;

/// Decoder progress through the current unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderState {
    #[default]
    Seeking,
    LabelRead,
    Walking,
    Complete,
    MessageOnly,
}

/// Running totals across all units handled by a [FrameDecoder].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    /// CHDO units decoded.
    pub units: usize,
    /// Control messages decoded.
    pub messages: usize,
    /// Bytes discarded while searching for a label.
    pub skipped_bytes: usize,
    /// CHDOs skipped because their type is not in the dictionary.
    pub unknown_records: usize,
}

/// Mission and type summary taken from the primary CHDO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Data description package id from the label.
    pub ddp_id: String,
    pub mission_id: u64,
    pub major: u64,
    pub minor: u64,
    pub format: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RecordSpan {
    chdo_type: u16,
    offset: usize,
    len: usize,
    declared_length: u16,
}

/// A decoded CHDO; a view into its unit's buffer.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    pub schema: &'a RecordSchema,
    /// Offset of the CHDO header within the unit.
    pub offset: usize,
    /// Length from the CHDO header. For aggregations this covers the contained records.
    pub declared_length: u16,
    bytes: &'a [u8],
}

impl<'a> Record<'a> {
    #[must_use]
    pub fn chdo_type(&self) -> u16 {
        self.schema.chdo_type()
    }

    #[must_use]
    pub fn classification(&self) -> Classification {
        self.schema.classification()
    }

    /// Header and data bytes. Aggregations only have a header.
    #[must_use]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    #[must_use]
    pub fn header(&self) -> &'a [u8] {
        &self.bytes[..CHDO_HEADER_LEN]
    }

    /// Bytes following the header.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        &self.bytes[CHDO_HEADER_LEN..]
    }

    /// Decode a field defined by this record's schema.
    ///
    /// # Errors
    /// [Error::BufferUnderflow] if the field extends beyond the record and
    /// [Error::InvalidArgument] if the field cannot be decoded as requested.
    pub fn field_value(&self, name: &str, kind: As) -> Result<Option<FieldValue>> {
        match self.schema.field(name) {
            Some(field) => self.decode(field, kind).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn decode(&self, field: &FieldSchema, kind: As) -> Result<FieldValue> {
        field::decode(self.data(), self.schema, field, kind)
    }
}

/// A single decoded SFDU.
///
/// The unit owns a copy of its bytes, label included. Records are views into that buffer
/// in stream order.
#[derive(Debug, Clone)]
pub struct DecodedUnit {
    dictionary: Arc<Dictionary>,
    label: Label,
    buf: Vec<u8>,
    records: Vec<RecordSpan>,
    index: HashMap<u16, usize>,
    identity: Option<Identity>,
    last_record_offset: Option<usize>,
    message: Option<ControlMessage>,
    header_only: bool,
}

impl DecodedUnit {
    #[must_use]
    pub fn label(&self) -> &Label {
        &self.label
    }

    /// Identity summary. `None` for control messages.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn message(&self) -> Option<&ControlMessage> {
        self.message.as_ref()
    }

    #[must_use]
    pub fn is_message(&self) -> bool {
        self.message.is_some()
    }

    /// True if decoded with [FrameDecoder::decode_header_only].
    #[must_use]
    pub fn is_header_only(&self) -> bool {
        self.header_only
    }

    #[must_use]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// All bytes of the unit, label included.
    #[must_use]
    pub fn raw_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Offset of the last CHDO header encountered, which is the data CHDO for a complete
    /// unit.
    #[must_use]
    pub fn last_record_offset(&self) -> Option<usize> {
        self.last_record_offset
    }

    /// Label and all CHDO headers, through the header of the last CHDO, excluding its data.
    #[must_use]
    pub fn entire_header(&self) -> &[u8] {
        match self.last_record_offset {
            Some(offset) => &self.buf[..(offset + CHDO_HEADER_LEN).min(self.buf.len())],
            None => &self.buf,
        }
    }

    fn view(&self, span: &RecordSpan) -> Option<Record<'_>> {
        let schema = self.dictionary.schema(span.chdo_type)?;
        Some(Record {
            schema,
            offset: span.offset,
            declared_length: span.declared_length,
            bytes: &self.buf[span.offset..span.offset + span.len],
        })
    }

    /// Decoded records in stream order.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.records.iter().filter_map(|span| self.view(span))
    }

    #[must_use]
    pub fn record(&self, chdo_type: u16) -> Option<Record<'_>> {
        self.index
            .get(&chdo_type)
            .and_then(|&idx| self.view(&self.records[idx]))
    }

    #[must_use]
    pub fn has_record(&self, chdo_type: u16) -> bool {
        self.index.contains_key(&chdo_type)
    }

    /// The data classified CHDO. Header-only units do not have one.
    #[must_use]
    pub fn data_record(&self) -> Option<Record<'_>> {
        self.records().find(|r| r.classification().is_data())
    }

    /// Data of the data CHDO, typically the frame or packet.
    #[must_use]
    pub fn data_payload(&self) -> Option<&[u8]> {
        self.data_record().map(|r| r.data())
    }

    /// First record in stream order whose schema defines `name`.
    pub(crate) fn find_field(&self, name: &str) -> Option<(Record<'_>, &FieldSchema)> {
        self.records()
            .find_map(|rec| rec.schema.field(name).map(|field| (rec, field)))
    }

    /// Decode a field from the first record in stream order that defines it.
    ///
    /// Returns `Ok(None)` if no decoded record defines the field.
    ///
    /// # Errors
    /// [Error::BufferUnderflow] if the field extends beyond its record and
    /// [Error::InvalidArgument] if the field cannot be decoded as requested.
    pub fn field_value(&self, name: &str, kind: As) -> Result<Option<FieldValue>> {
        match self.find_field(name) {
            Some((rec, field)) => rec.decode(field, kind).map(Some),
            None => Ok(None),
        }
    }

    /// # Errors
    /// See [DecodedUnit::field_value].
    pub fn unsigned(&self, name: &str) -> Result<Option<u64>> {
        Ok(self
            .field_value(name, As::Unsigned)?
            .and_then(|v| v.as_u64()))
    }

    /// # Errors
    /// See [DecodedUnit::field_value].
    pub fn signed(&self, name: &str) -> Result<Option<i64>> {
        Ok(self.field_value(name, As::Signed)?.and_then(|v| v.as_i64()))
    }

    /// # Errors
    /// See [DecodedUnit::field_value].
    pub fn float(&self, name: &str) -> Result<Option<f64>> {
        Ok(self.field_value(name, As::Float)?.and_then(|v| v.as_f64()))
    }

    /// # Errors
    /// See [DecodedUnit::field_value].
    pub fn ascii(&self, name: &str) -> Result<Option<String>> {
        Ok(self.field_value(name, As::Ascii)?.and_then(|v| match v {
            FieldValue::Ascii(s) => Some(s),
            _ => None,
        }))
    }

    /// # Errors
    /// See [DecodedUnit::field_value].
    pub fn date(&self, name: &str) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        Ok(self.field_value(name, As::Date)?.and_then(|v| v.as_date()))
    }

    /// # Errors
    /// See [DecodedUnit::field_value].
    pub fn sclk(&self, name: &str) -> Result<Option<Sclk>> {
        Ok(self.field_value(name, As::Sclk)?.and_then(|v| v.as_sclk()))
    }

    /// # Errors
    /// See [DecodedUnit::field_value].
    pub fn bytes(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.field_value(name, As::Bytes)?.and_then(|v| match v {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }))
    }

    /// Boolean field value. Fields not defined by any decoded record are false.
    ///
    /// # Errors
    /// See [DecodedUnit::field_value].
    pub fn boolean(&self, name: &str) -> Result<bool> {
        match self.field_value(name, As::Boolean)? {
            Some(v) => Ok(v.as_bool().unwrap_or_default()),
            None => {
                warn!(field = name, "boolean field does not exist; using false");
                Ok(false)
            }
        }
    }

    fn store(&mut self, span: RecordSpan) {
        if let Some(&idx) = self.index.get(&span.chdo_type) {
            debug!(chdo_type = span.chdo_type, "repeated CHDO replaces earlier one");
            self.records[idx] = span;
        } else {
            self.index.insert(span.chdo_type, self.records.len());
            self.records.push(span);
        }
    }

    fn identify(&self) -> Result<Identity> {
        let lookup = |name: &str| -> Result<u64> {
            self.unsigned(name)?
                .ok_or_else(|| Error::MissingIdentityField(name.to_string()))
        };
        Ok(Identity {
            ddp_id: self.label.ddp_id(),
            mission_id: lookup(MISSION_ID)?,
            major: lookup(MAJOR)?,
            minor: lookup(MINOR)?,
            format: lookup(FORMAT)?,
        })
    }
}

/// Decodes CHDO structured SFDUs.
///
/// A decoder is cheap to create and holds only per-unit state, so use one per stream. The
/// [Dictionary] may be shared between any number of decoders.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use sfdu::dictionary::{
///     Classification, Dictionary, DictionaryConfig, FieldFormat, FieldSchema, RecordSchema,
/// };
/// use sfdu::chdo::FrameDecoder;
///
/// let field = |id: &str, offset: usize| {
///     FieldSchema::builder()
///         .id(id)
///         .byte_offset(offset)
///         .bit_length(8)
///         .format(FieldFormat::UnsignedInt)
///         .build()
/// };
/// let primary = RecordSchema::new(
///     2,
///     "primary",
///     Classification::Primary,
///     Some(4),
///     vec![field("major", 0), field("minor", 1), field("mission_id", 2), field("format", 3)],
/// )
/// .unwrap();
/// let data = RecordSchema::new(10, "data", Classification::Data, None, vec![]).unwrap();
/// let dict = Dictionary::new(
///     DictionaryConfig::builder().records(vec![primary, data]).build(),
/// )
/// .unwrap();
///
/// let mut unit = b"garbageNJPL1I00C02200000014".to_vec();
/// unit.extend_from_slice(&[0, 2, 0, 4, 7, 1, 42, 3]); // primary
/// unit.extend_from_slice(&[0, 10, 0, 2, 0xca, 0xfe]); // data
///
/// let mut decoder = FrameDecoder::new(Arc::new(dict));
/// let unit = decoder.decode(&unit).unwrap();
/// let identity = unit.identity().unwrap();
/// assert_eq!(identity.major, 7);
/// assert_eq!(identity.mission_id, 42);
/// assert_eq!(unit.data_payload().unwrap(), &[0xca, 0xfe]);
/// ```
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    dictionary: Arc<Dictionary>,
    state: DecoderState,
    pub stats: DecoderStats,
}

impl FrameDecoder {
    #[must_use]
    pub fn new(dictionary: Arc<Dictionary>) -> Self {
        FrameDecoder {
            dictionary,
            state: DecoderState::default(),
            stats: DecoderStats::default(),
        }
    }

    #[must_use]
    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dictionary
    }

    /// State reached by the most recent decode.
    #[must_use]
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Decode the first unit found in `bytes`.
    ///
    /// Bytes preceding the first recognized control authority id are skipped. The unit
    /// must end with a data classified CHDO.
    ///
    /// # Errors
    /// - [Error::BufferUnderflow] if no label is found or the unit is truncated
    /// - [Error::UnsupportedVersion] and [Error::InvalidLength] for bad labels
    /// - [Error::MissingDataRecord] if the last CHDO is not classified data
    /// - [Error::MissingIdentityField] if the identity fields are not defined
    pub fn decode(&mut self, bytes: &[u8]) -> Result<DecodedUnit> {
        self.decode_unit(bytes, false)
    }

    /// Decode only the label and the CHDOs preceding the data CHDO.
    ///
    /// The walk stops at the first data classified or unknown CHDO, so the payload does
    /// not need to be present in `bytes`.
    ///
    /// # Errors
    /// As [FrameDecoder::decode], except [Error::MissingDataRecord] is never returned and
    /// version 3 labels are [Error::UnsupportedVersion].
    pub fn decode_header_only(&mut self, bytes: &[u8]) -> Result<DecodedUnit> {
        self.decode_unit(bytes, true)
    }

    /// Locate the first recognized control authority id.
    fn seek(&mut self, bytes: &[u8]) -> Result<usize> {
        self.state = DecoderState::Seeking;
        let found = bytes
            .windows(ANCHOR_LEN)
            .position(|window| self.dictionary.is_anchor(window));
        match found {
            Some(start) => {
                if start > 0 {
                    debug!(skipped = start, "resynchronized on label");
                    self.stats.skipped_bytes += start;
                }
                Ok(start)
            }
            None => {
                let skipped = bytes.len().saturating_sub(ANCHOR_LEN - 1);
                self.stats.skipped_bytes += skipped;
                Err(Error::underflow(
                    ANCHOR_LEN * 8,
                    (bytes.len() - skipped) * 8,
                ))
            }
        }
    }

    fn decode_unit(&mut self, bytes: &[u8], header_only: bool) -> Result<DecodedUnit> {
        let span = span!(Level::DEBUG, "decode", header_only);
        let _guard = span.enter();

        let start = self.seek(bytes)?;
        let bytes = &bytes[start..];

        let label = Label::parse(bytes)?;
        self.state = DecoderState::LabelRead;
        trace!(%label, "label");

        match label.kind {
            LabelKind::Message if header_only => Err(Error::UnsupportedVersion {
                version: label.version,
                label: label.to_string(),
            }),
            LabelKind::Message => self.decode_message(label, bytes),
            LabelKind::Chdo { length } => {
                let mut end = LABEL_LEN + length;
                if end > bytes.len() {
                    if !header_only {
                        return Err(Error::underflow(end * 8, bytes.len() * 8));
                    }
                    end = bytes.len();
                }
                let mut unit = DecodedUnit {
                    dictionary: self.dictionary.clone(),
                    label,
                    buf: bytes[..end].to_vec(),
                    records: Vec::default(),
                    index: HashMap::default(),
                    identity: None,
                    last_record_offset: None,
                    message: None,
                    header_only,
                };
                self.walk(&mut unit)?;
                unit.identity = Some(unit.identify()?);
                self.state = DecoderState::Complete;
                self.stats.units += 1;
                Ok(unit)
            }
        }
    }

    fn decode_message(&mut self, label: Label, bytes: &[u8]) -> Result<DecodedUnit> {
        let kind = MessageKind::from_label(&label)?;
        let (lines, consumed) = if kind.has_body() {
            parse_body(&bytes[LABEL_LEN..])?
        } else {
            (Vec::default(), 0)
        };
        self.state = DecoderState::MessageOnly;
        self.stats.messages += 1;
        Ok(DecodedUnit {
            dictionary: self.dictionary.clone(),
            label,
            buf: bytes[..LABEL_LEN + consumed].to_vec(),
            records: Vec::default(),
            index: HashMap::default(),
            identity: None,
            last_record_offset: None,
            message: Some(ControlMessage::new(kind, lines)),
            header_only: false,
        })
    }

    /// Walk the CHDOs following the label.
    fn walk(&mut self, unit: &mut DecodedUnit) -> Result<()> {
        self.state = DecoderState::Walking;
        let end = unit.buf.len();
        let mut cursor = BitCursor::new(&unit.buf);
        let mut spans = Vec::default();
        let mut last: Option<Classification> = None;
        let mut pos = LABEL_LEN;
        let mut last_offset = None;

        while pos < end {
            if unit.header_only && end - pos < CHDO_HEADER_LEN {
                // header cut short; everything before it is header
                last_offset = Some(pos);
                break;
            }
            cursor.set_position(pos * 8)?;
            let chdo_type = cursor.read_u16(16)?;
            let length = cursor.read_u16(16)?;
            let schema = self.dictionary.schema(chdo_type);
            last_offset = Some(pos);

            if unit.header_only && schema.map_or(true, |s| s.classification().is_data()) {
                break;
            }

            let data_len = usize::from(length);
            match schema {
                None => {
                    warn!(chdo_type, length, offset = pos, "unknown CHDO type; skipping");
                    self.stats.unknown_records += 1;
                    pos += CHDO_HEADER_LEN + data_len;
                }
                Some(schema) if schema.classification().is_aggregation() => {
                    trace!(chdo_type, length, "aggregation");
                    spans.push(RecordSpan {
                        chdo_type,
                        offset: pos,
                        len: CHDO_HEADER_LEN,
                        declared_length: length,
                    });
                    pos += CHDO_HEADER_LEN;
                }
                Some(schema) => {
                    let record_end = pos + CHDO_HEADER_LEN + data_len;
                    if record_end > end {
                        return Err(Error::underflow(record_end * 8, end * 8));
                    }
                    trace!(chdo_type, length, classification = %schema.classification(), "chdo");
                    spans.push(RecordSpan {
                        chdo_type,
                        offset: pos,
                        len: CHDO_HEADER_LEN + data_len,
                        declared_length: length,
                    });
                    pos = record_end;
                }
            }
            last = schema.map(RecordSchema::classification);
        }

        for span in spans {
            unit.store(span);
        }
        unit.last_record_offset = last_offset;

        if !unit.header_only && last != Some(Classification::Data) {
            return Err(Error::MissingDataRecord);
        }
        Ok(())
    }
}
