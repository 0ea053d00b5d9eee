#![allow(dead_code)]
use std::{path::PathBuf, sync::Arc};

use sfdu::Dictionary;

pub const PRIMARY: u16 = 2;
pub const SECONDARY: u16 = 69;
pub const TERTIARY: u16 = 27;
pub const DATA: u16 = 10;

pub fn fixture_path(name: &str) -> PathBuf {
    let mut path =
        PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set"));
    path.push("tests/fixtures");
    path.push(name);
    path
}

pub fn dictionary() -> Arc<Dictionary> {
    Arc::new(Dictionary::with_file(fixture_path("dictionary.json")).unwrap())
}

pub fn chdo(chdo_type: u16, data: &[u8]) -> Vec<u8> {
    let mut buf = chdo_type.to_be_bytes().to_vec();
    buf.extend_from_slice(&u16::try_from(data.len()).unwrap().to_be_bytes());
    buf.extend_from_slice(data);
    buf
}

/// Aggregation CHDO header followed by its contents.
pub fn aggregation(contents: &[Vec<u8>]) -> Vec<u8> {
    let contents = contents.concat();
    let mut buf = 1u16.to_be_bytes().to_vec();
    buf.extend_from_slice(&u16::try_from(contents.len()).unwrap().to_be_bytes());
    buf.extend_from_slice(&contents);
    buf
}

/// Version 1 label, ASCII decimal length.
pub fn v1(chdos: &[Vec<u8>]) -> Vec<u8> {
    let body = chdos.concat();
    let mut buf = format!("NJPL1I00C022{:08}", body.len()).into_bytes();
    buf.extend_from_slice(&body);
    buf
}

/// Version 2 label, binary length.
pub fn v2(chdos: &[Vec<u8>]) -> Vec<u8> {
    let body = chdos.concat();
    let mut buf = b"NJPL2I00C022".to_vec();
    buf.extend_from_slice(&(body.len() as u64).to_be_bytes());
    buf.extend_from_slice(&body);
    buf
}

pub fn primary(major: u8, minor: u8, mission_id: u8, format: u8) -> Vec<u8> {
    chdo(PRIMARY, &[major, minor, mission_id, format])
}

pub fn tertiary(frame_type: u8, anomaly: bool, padded: bool) -> Vec<u8> {
    // signed_offset of -5: little-endian sign-magnitude across bytes 1 and 2
    let flags = (u8::from(anomaly) << 7) | (u8::from(padded) << 6) | 0b01;
    chdo(TERTIARY, &[frame_type, flags, 0x60, 0])
}

/// Telemetry secondary CHDO contents.
#[derive(Debug, Clone)]
pub struct Secondary {
    pub scid: u16,
    pub dss: u8,
    /// Days since 1958
    pub days: u16,
    pub millis: u32,
    pub extension: u16,
    pub extended: bool,
    pub tenths_of_micros: bool,
    pub vcid: u8,
    pub decode_status: u8,
    pub turbo_rate_denominator: u8,
    pub out_of_sync: bool,
    pub number_bits: u32,
    pub bit_rate: f32,
    pub sclk: (u32, u16),
    pub station: [u8; 6],
}

impl Default for Secondary {
    fn default() -> Self {
        Secondary {
            scid: 168,
            dss: 14,
            // 2020-01-01
            days: 22645,
            millis: 3_600_000,
            extension: 0,
            extended: false,
            tenths_of_micros: false,
            vcid: 5,
            decode_status: 0,
            turbo_rate_denominator: 0,
            out_of_sync: false,
            number_bits: 8920,
            bit_rate: 2000.0,
            sclk: (1_000_000, 0x8000),
            station: *b"DSS-14",
        }
    }
}

impl Secondary {
    pub fn chdo(&self) -> Vec<u8> {
        let mut buf = vec![0u8];
        buf.extend_from_slice(&self.scid.to_be_bytes());
        buf.push(self.dss);
        buf.extend_from_slice(&self.days.to_be_bytes());
        buf.extend_from_slice(&self.millis.to_be_bytes());
        buf.extend_from_slice(&self.extension.to_be_bytes());
        buf.push(
            (u8::from(self.extended) << 7)
                | (u8::from(self.tenths_of_micros) << 6)
                | (self.vcid & 0x3f),
        );
        buf.push(self.decode_status);
        buf.push(self.turbo_rate_denominator);
        buf.push(u8::from(self.out_of_sync));
        buf.extend_from_slice(&self.number_bits.to_be_bytes());
        buf.extend_from_slice(&self.bit_rate.to_be_bytes());
        buf.extend_from_slice(&self.sclk.0.to_be_bytes());
        buf.extend_from_slice(&self.sclk.1.to_be_bytes());
        buf.extend_from_slice(&self.station);
        assert_eq!(buf.len(), 36);
        chdo(SECONDARY, &buf)
    }
}

/// A typical frame unit: aggregation of primary, secondary, tertiary, and data CHDOs.
pub fn frame_unit(secondary: &Secondary, payload: &[u8]) -> Vec<u8> {
    v2(&[aggregation(&[
        primary(1, 1, 42, 3),
        secondary.chdo(),
        tertiary(0, false, false),
        chdo(DATA, payload),
    ])])
}
