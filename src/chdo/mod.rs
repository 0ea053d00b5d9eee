//! CHDO structured SFDU decoding.
//!
//! An SFDU starts with a 20 byte [Label]. Version 1 and 2 labels are followed by a sequence
//! of CHDOs, each a big-endian `u16` type, a `u16` length, and `length` bytes of data, whose
//! layout comes from a [Dictionary](crate::dictionary::Dictionary). The last CHDO of a unit
//! is always the data CHDO carrying the frame or packet. Version 3 labels introduce
//! [ControlMessage]s.
//!
//! Use [FrameDecoder] for buffered units and [read_units] for byte streams.
mod bytes;
mod decoder;
mod field;
pub mod fields;
mod label;
mod message;
mod property;
mod station;
mod stream;

pub use decoder::*;
pub use field::{As, FieldValue, Sclk};
pub use label::{Label, LabelKind, LABEL_LEN, MAX_UNIT_SIZE};
pub use message::{ControlMessage, MessageKind};
pub use property::evaluate;
pub use stream::{read_units, UnitReader};
