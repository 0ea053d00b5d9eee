//! Station metadata accessors common to DSN CHDO layouts.
use chrono::{DateTime, Utc};

use super::decoder::DecodedUnit;
use super::fields::{
    BIT_RATE, DATA_SOURCE, ERT, NUMBER_BITS, SCID_FIELDS, TURBO_RATE_DENOMINATOR,
    VIRTUAL_CHANNEL_ID,
};
use crate::prelude::*;

impl DecodedUnit {
    /// Spacecraft id from the first of `scft_id`, `8b_scft_id`, or `spacecraft_id` that
    /// is defined.
    ///
    /// # Errors
    /// See [DecodedUnit::field_value].
    pub fn scid(&self) -> Result<Option<u64>> {
        for name in SCID_FIELDS {
            if let Some(scid) = self.unsigned(name)? {
                return Ok(Some(scid));
            }
        }
        Ok(None)
    }

    /// # Errors
    /// See [DecodedUnit::field_value].
    pub fn vcid(&self) -> Result<Option<u64>> {
        self.unsigned(VIRTUAL_CHANNEL_ID)
    }

    /// Deep space station id.
    ///
    /// # Errors
    /// See [DecodedUnit::field_value].
    pub fn dss_id(&self) -> Result<Option<u64>> {
        self.unsigned(DATA_SOURCE)
    }

    /// Turbo code rate, e.g., `1/6`.
    ///
    /// # Errors
    /// See [DecodedUnit::field_value].
    pub fn turbo_rate(&self) -> Result<Option<String>> {
        Ok(self
            .unsigned(TURBO_RATE_DENOMINATOR)?
            .map(|denom| format!("1/{denom}")))
    }

    /// Number of valid data bits in the data CHDO, zero if not defined.
    ///
    /// # Errors
    /// See [DecodedUnit::field_value].
    pub fn number_of_data_bits(&self) -> Result<u64> {
        Ok(self.unsigned(NUMBER_BITS)?.unwrap_or_default())
    }

    /// Earth received time.
    ///
    /// # Errors
    /// See [DecodedUnit::field_value].
    pub fn ert(&self) -> Result<Option<DateTime<Utc>>> {
        self.date(ERT)
    }

    /// # Errors
    /// See [DecodedUnit::field_value].
    pub fn bit_rate(&self) -> Result<Option<f64>> {
        self.float(BIT_RATE)
    }
}
