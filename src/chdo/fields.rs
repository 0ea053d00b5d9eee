//! Well known CHDO field and property names.

/// Identity fields, normally defined by the primary CHDO.
pub const MISSION_ID: &str = "mission_id";
pub const MAJOR: &str = "major";
pub const MINOR: &str = "minor";
pub const FORMAT: &str = "format";

/// Spacecraft id, in order of preference.
pub const SCID_FIELDS: [&str; 3] = ["scft_id", "8b_scft_id", "spacecraft_id"];
pub const VIRTUAL_CHANNEL_ID: &str = "virtual_channel_id";
pub const DATA_SOURCE: &str = "data_source";
pub const TURBO_RATE_DENOMINATOR: &str = "turbo_rate_denominator";
pub const NUMBER_BITS: &str = "number_bits";
pub const ERT: &str = "ert";
pub const BIT_RATE: &str = "bit_rate";

pub const IS_FRAME: &str = "isFrame";
pub const IS_PACKET: &str = "isPacket";
pub const IS_OUT_OF_SYNC: &str = "isOutOfSync";
pub const IS_IDLE: &str = "isIdle";
pub const IS_INVALID: &str = "isInvalid";
pub const IS_CDR: &str = "isCdr";
pub const IS_ECDR: &str = "isEcdr";
pub const IS_QQC_DATA: &str = "isQqcData";
pub const IS_MONITOR_DATA: &str = "isMonitorData";
pub const IS_ANOMALY: &str = "isAnomaly";
pub const IS_DATA_PADDED: &str = "isDataPadded";
pub const IS_PACKET_FULL: &str = "isPacketFull";
pub const IS_TURBO: &str = "isTurbo";
pub const IS_GIF_FRAME: &str = "isGifFrame";
