//! Version 3 SFDU control messages.
//!
//! Query servers bracket their responses and report status with version 3 labels. Query
//! parameter and status messages carry a body of `;` terminated `KEY = VALUE` lines ending
//! with an `END_OBJECT` line. Line feeds within the body are not significant.
use serde::Serialize;
use tracing::info;

use super::label::Label;
use crate::prelude::*;

const END_OBJECT: &str = "END_OBJECT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    TdsResponseStart,
    TdsResponseEnd,
    TdsQueryStart,
    TdsQueryEnd,
    /// Status/error message. Also sent as a heartbeat.
    StatusStart,
    StatusEnd,
}

impl MessageKind {
    const ALL: [MessageKind; 6] = [
        MessageKind::TdsResponseStart,
        MessageKind::TdsResponseEnd,
        MessageKind::TdsQueryStart,
        MessageKind::TdsQueryEnd,
        MessageKind::StatusStart,
        MessageKind::StatusEnd,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            MessageKind::TdsResponseStart => "CCSD3ZS00001TDSQDATA",
            MessageKind::TdsResponseEnd => "CCSD3RE00000TDSQDATA",
            MessageKind::TdsQueryStart => "NJPL3KS0L009TDSQUERY",
            MessageKind::TdsQueryEnd => "CCSD3RE00000TDSQUERY",
            MessageKind::StatusStart => "NJPL3KS0L009STAT/ERR",
            MessageKind::StatusEnd => "CCSD3RE00000STAT/ERR",
        }
    }

    /// Identify a version 3 label. Matching ignores ASCII case.
    ///
    /// # Errors
    /// [Error::UnsupportedVersion] if the label is not a known control message.
    pub fn from_label(label: &Label) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().as_bytes().eq_ignore_ascii_case(label.raw()))
            .ok_or_else(|| Error::UnsupportedVersion {
                version: label.version,
                label: label.to_string(),
            })
    }

    /// Whether `KEY = VALUE` lines follow the label.
    #[must_use]
    pub fn has_body(self) -> bool {
        matches!(self, MessageKind::TdsQueryStart | MessageKind::StatusStart)
    }
}

/// Accumulates message body bytes until the `END_OBJECT` line.
#[derive(Debug, Default)]
pub(crate) struct BodyCollector {
    line: Vec<u8>,
    lines: Vec<String>,
    done: bool,
}

impl BodyCollector {
    /// Add a byte, returning true once the body is complete.
    pub fn push(&mut self, b: u8) -> bool {
        if self.done {
            return true;
        }
        if b == b'\n' {
            return false;
        }
        self.line.push(b);
        if b == b';' {
            let line = String::from_utf8_lossy(&self.line[..self.line.len() - 1])
                .trim()
                .to_string();
            self.line.clear();
            if line.starts_with(END_OBJECT) {
                self.done = true;
            } else {
                self.lines.push(line);
            }
        }
        self.done
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// Collect a message body from the start of `buf`.
///
/// Returns the lines and the number of bytes consumed.
pub(crate) fn parse_body(buf: &[u8]) -> Result<(Vec<String>, usize)> {
    let mut body = BodyCollector::default();
    for (idx, b) in buf.iter().enumerate() {
        if body.push(*b) {
            return Ok((body.into_lines(), idx + 1));
        }
    }
    Err(Error::underflow((buf.len() + 1) * 8, buf.len() * 8))
}

/// A decoded version 3 control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlMessage {
    pub kind: MessageKind,
    /// Body lines without their `;` terminator.
    pub lines: Vec<String>,
}

impl ControlMessage {
    pub(crate) fn new(kind: MessageKind, lines: Vec<String>) -> Self {
        let msg = ControlMessage { kind, lines };
        msg.log();
        msg
    }

    fn log(&self) {
        match self.kind {
            MessageKind::TdsResponseStart => info!("TDS response begin"),
            MessageKind::TdsResponseEnd => info!("TDS response end"),
            MessageKind::TdsQueryStart => info!("TDS query parameters"),
            MessageKind::StatusStart => info!("SFDU status message"),
            MessageKind::TdsQueryEnd | MessageKind::StatusEnd => {}
        }
        for line in &self.lines {
            info!("    {line}");
        }
    }

    /// `KEY = VALUE` pairs, trimmed. Lines without `=` are skipped.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| {
            line.split_once('=')
                .map(|(key, value)| (key.trim(), value.trim()))
        })
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}
