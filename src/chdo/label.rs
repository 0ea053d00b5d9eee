use std::borrow::Cow;
use std::fmt::Display;

use serde::Serialize;

use crate::dictionary::ANCHOR_LEN;
use crate::prelude::*;

/// Total length of an SFDU label.
pub const LABEL_LEN: usize = 20;

/// Largest unit, label included, that will be accepted.
pub const MAX_UNIT_SIZE: usize = 131_096;

const VERSION_OFFSET: usize = 4;
const CLASS_OFFSET: usize = 5;
const SPARE_OFFSET: usize = 6;
const DDID_OFFSET: usize = 8;
const LENGTH_OFFSET: usize = 12;

/// What follows the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    /// Version 1 or 2: `length` bytes of CHDOs follow.
    Chdo { length: usize },
    /// Version 3: a control message.
    Message,
}

/// A parsed 20 byte SFDU label.
///
/// | bytes | content                                   |
/// |-------|-------------------------------------------|
/// | 0-3   | control authority id (anchor)             |
/// | 4     | version id, ASCII digit                   |
/// | 5     | class id                                  |
/// | 6-7   | delimitation / spare                      |
/// | 8-11  | data description id                       |
/// | 12-19 | length (v1 ASCII decimal, v2 binary u64) or message marker (v3) |
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    #[serde(skip)]
    raw: [u8; LABEL_LEN],
    pub version: u8,
    pub kind: LabelKind,
}

fn text(buf: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(buf)
}

impl Label {
    /// Parse a label from the first [LABEL_LEN] bytes of `buf`.
    ///
    /// # Errors
    /// [Error::BufferUnderflow] if `buf` is too short, [Error::UnsupportedVersion] for
    /// versions other than 1, 2, or 3, or [Error::InvalidLength] if the declared length
    /// cannot be parsed or is larger than [MAX_UNIT_SIZE].
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let raw: [u8; LABEL_LEN] = buf
            .get(..LABEL_LEN)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| Error::underflow(LABEL_LEN * 8, buf.len() * 8))?;

        let version = raw[VERSION_OFFSET].wrapping_sub(b'0');
        let kind = match version {
            1 => {
                let digits = text(&raw[LENGTH_OFFSET..]);
                let length = digits
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| Self::invalid_length(&raw, None))?;
                LabelKind::Chdo {
                    length: Self::check_length(&raw, length)?,
                }
            }
            2 => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&raw[LENGTH_OFFSET..]);
                let length = i64::try_from(u64::from_be_bytes(bytes)).unwrap_or(i64::MAX);
                LabelKind::Chdo {
                    length: Self::check_length(&raw, length)?,
                }
            }
            3 => LabelKind::Message,
            _ => {
                return Err(Error::UnsupportedVersion {
                    version,
                    label: text(&raw[..LENGTH_OFFSET]).into_owned(),
                })
            }
        };

        Ok(Label { raw, version, kind })
    }

    fn invalid_length(raw: &[u8], length: Option<i64>) -> Error {
        Error::InvalidLength {
            length,
            max: MAX_UNIT_SIZE,
            label: text(&raw[..LENGTH_OFFSET]).into_owned(),
        }
    }

    fn check_length(raw: &[u8], length: i64) -> Result<usize> {
        match usize::try_from(length) {
            Ok(len) if len <= MAX_UNIT_SIZE => Ok(len),
            _ => Err(Self::invalid_length(raw, Some(length))),
        }
    }

    #[must_use]
    pub fn raw(&self) -> &[u8; LABEL_LEN] {
        &self.raw
    }

    /// Control authority id.
    #[must_use]
    pub fn anchor(&self) -> &[u8] {
        &self.raw[..ANCHOR_LEN]
    }

    #[must_use]
    pub fn class_id(&self) -> char {
        char::from(self.raw[CLASS_OFFSET])
    }

    #[must_use]
    pub fn spare(&self) -> Cow<'_, str> {
        text(&self.raw[SPARE_OFFSET..DDID_OFFSET])
    }

    /// Data description id.
    #[must_use]
    pub fn ddid(&self) -> Cow<'_, str> {
        text(&self.raw[DDID_OFFSET..LENGTH_OFFSET])
    }

    /// Data description package id, the control authority id followed by the data
    /// description id.
    #[must_use]
    pub fn ddp_id(&self) -> String {
        format!("{}{}", text(self.anchor()), self.ddid())
    }

    /// Number of bytes following the label, for CHDO labels.
    #[must_use]
    pub fn length(&self) -> Option<usize> {
        match self.kind {
            LabelKind::Chdo { length } => Some(length),
            LabelKind::Message => None,
        }
    }

    #[must_use]
    pub fn is_message(&self) -> bool {
        self.kind == LabelKind::Message
    }

    /// Message marker, for version 3 labels.
    #[must_use]
    pub fn marker(&self) -> Option<Cow<'_, str>> {
        self.is_message().then(|| text(&self.raw[LENGTH_OFFSET..]))
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            LabelKind::Chdo { length } => {
                write!(f, "{}[{length}]", text(&self.raw[..LENGTH_OFFSET]))
            }
            LabelKind::Message => f.write_str(&text(&self.raw)),
        }
    }
}
