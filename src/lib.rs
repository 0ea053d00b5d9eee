#![doc = include_str!("../README.md")]

mod error;
mod prelude;

pub mod bits;
pub mod chdo;
pub mod dictionary;

pub use chdo::{read_units, As, DecodedUnit, FieldValue, FrameDecoder};
pub use dictionary::Dictionary;
pub use error::{Error, Result};
