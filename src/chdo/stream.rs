use std::{io::Read, sync::Arc};

use tracing::{debug, span, Level};

use super::bytes::Bytes;
use super::decoder::{DecodedUnit, FrameDecoder};
use super::label::{Label, LabelKind, LABEL_LEN, MAX_UNIT_SIZE};
use super::message::{BodyCollector, MessageKind};
use crate::dictionary::{Dictionary, ANCHOR_LEN};
use crate::prelude::*;

/// Reads [DecodedUnit]s from a byte stream.
///
/// Data that does not begin with a recognized control authority id is skipped. Errors for
/// a single unit are yielded and reading continues with the next unit; after an invalid
/// label, or a control message body longer than [MAX_UNIT_SIZE], the search resumes at
/// the byte following its anchor. Iteration ends at EOF; EOF within a unit yields a final
/// [Error::BufferUnderflow].
pub struct UnitReader<R>
where
    R: Read,
{
    bytes: Bytes<R>,
    decoder: FrameDecoder,
    done: bool,
}

impl<R> UnitReader<R>
where
    R: Read,
{
    pub fn new(reader: R, dictionary: Arc<Dictionary>) -> Self {
        UnitReader {
            bytes: Bytes::new(reader),
            decoder: FrameDecoder::new(dictionary),
            done: false,
        }
    }

    /// Decoder used for each unit, e.g., for its statistics.
    #[must_use]
    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    /// Number of bytes consumed from the reader.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.bytes.offset()
    }

    /// Advance to the next anchor, returning it, or `None` at EOF.
    fn seek(&mut self) -> Result<Option<[u8; ANCHOR_LEN]>> {
        let mut window = [0u8; ANCHOR_LEN];
        if !self.bytes.fill(&mut window)? {
            return Ok(None);
        }
        let mut skipped = 0;
        while !self.decoder.dictionary().is_anchor(&window) {
            let Some(b) = self.bytes.next()? else {
                return Ok(None);
            };
            window.rotate_left(1);
            window[ANCHOR_LEN - 1] = b;
            skipped += 1;
        }
        if skipped > 0 {
            debug!(skipped, offset = self.bytes.offset(), "resynchronized on label");
            self.decoder.stats.skipped_bytes += skipped;
        }
        Ok(Some(window))
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.bytes.fill(buf)? {
            Ok(())
        } else {
            Err(Error::underflow(buf.len() * 8, 0))
        }
    }

    /// Read the bytes of the next unit, label included.
    fn read_unit(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(anchor) = self.seek()? else {
            return Ok(None);
        };
        let mut buf = vec![0u8; LABEL_LEN];
        buf[..ANCHOR_LEN].copy_from_slice(&anchor);
        self.fill(&mut buf[ANCHOR_LEN..])?;

        let label = match Label::parse(&buf) {
            Ok(label) => label,
            Err(err) => {
                // resume the search just past this anchor
                self.bytes.push(&buf[1..]);
                return Err(err);
            }
        };
        match label.kind {
            LabelKind::Chdo { length } => {
                buf.resize(LABEL_LEN + length, 0);
                self.fill(&mut buf[LABEL_LEN..])?;
            }
            LabelKind::Message => {
                let kind = match MessageKind::from_label(&label) {
                    Ok(kind) => kind,
                    Err(err) => {
                        self.bytes.push(&buf[1..]);
                        return Err(err);
                    }
                };
                if kind.has_body() {
                    let mut body = BodyCollector::default();
                    loop {
                        let Some(b) = self.bytes.next()? else {
                            return Err(Error::underflow(8, 0));
                        };
                        buf.push(b);
                        if body.push(b) {
                            break;
                        }
                        if buf.len() > LABEL_LEN + MAX_UNIT_SIZE {
                            // unterminated; resume the search just past this anchor
                            self.bytes.push(&buf[1..]);
                            return Err(Error::InvalidLength {
                                length: i64::try_from(buf.len() - LABEL_LEN).ok(),
                                max: MAX_UNIT_SIZE,
                                label: label.to_string(),
                            });
                        }
                    }
                }
            }
        }
        Ok(Some(buf))
    }
}

impl<R> Iterator for UnitReader<R>
where
    R: Read,
{
    type Item = Result<DecodedUnit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let span = span!(Level::DEBUG, "read_unit", offset = self.bytes.offset());
        let _guard = span.enter();

        match self.read_unit() {
            Ok(Some(buf)) => Some(self.decoder.decode(&buf)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                if matches!(err, Error::BufferUnderflow { .. } | Error::Io(_)) {
                    self.done = true;
                }
                Some(Err(err))
            }
        }
    }
}

/// Iterate over the units in `reader`. See [UnitReader].
pub fn read_units<R>(reader: R, dictionary: Arc<Dictionary>) -> UnitReader<R>
where
    R: Read,
{
    UnitReader::new(reader, dictionary)
}
