use serde::Serialize;

use super::Ut61eParseError;

/// Number of bytes of one UT61E packet without the trailing CR LF
pub const PACKET_LEN: usize = 12;

/// The meter sends 7 data bits, bit 7 may carry the parity of the line
pub const DATA_MASK: u8 = 0x7F;

/// One packet in wire order. All bytes are already masked to 7 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPacket {
    pub range: u8,
    /// digit4 (most significant) first
    pub digits: [u8; 5],
    pub function: u8,
    pub status: u8,
    pub option1: u8,
    pub option2: u8,
    pub option3: u8,
    pub option4: u8,
}

impl RawPacket {
    pub fn new(bytes: [u8; PACKET_LEN]) -> Self {
        let b = bytes.map(|byte| byte & DATA_MASK);
        return RawPacket {
            range: b[0],
            digits: [b[1], b[2], b[3], b[4], b[5]],
            function: b[6],
            status: b[7],
            option1: b[8],
            option2: b[9],
            option3: b[10],
            option4: b[11],
        };
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Ut61eParseError> {
        let array: [u8; PACKET_LEN] = bytes
            .try_into()
            .map_err(|_| Ut61eParseError::InvalidPacketLength(bytes.len()))?;
        Ok(RawPacket::new(array))
    }
}

// Range settings
// multiplier:       factor from the displayed unit to the base unit
// decimal_position: number of digits right of the decimal point
// display_unit:     the unit the meter shows on its LCD
#[derive(Debug, Clone, PartialEq)]
pub struct RangeEntry {
    pub multiplier: f64,
    pub decimal_position: u8,
    pub display_unit: &'static str,
}

impl RangeEntry {
    pub const fn new(multiplier: f64, decimal_position: u8, display_unit: &'static str) -> Self {
        RangeEntry { multiplier, decimal_position, display_unit }
    }
}

pub type RangeTable = &'static [(u8, RangeEntry)];

/// Everything selected by the rotary dial
#[derive(Debug, Clone)]
pub struct FunctionEntry {
    pub mode: &'static str,
    pub ranges: RangeTable,
    pub unit: &'static str,
}

impl FunctionEntry {
    pub fn get_range(&self, code: u8) -> Option<&'static RangeEntry> {
        self.ranges.iter()
            .find(|(range_code, _)| *range_code == code)
            .map(|(_, entry)| entry)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CurrentType {
    AC,
    DC,
    #[serde(rename = "none")]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Peak {
    Max,
    Min,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeMode {
    Auto,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Normal,
    Overload,
    Underload,
}

/// The indicators of the LCD which do not depend on the dial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeterStatus {
    pub current_type: CurrentType,
    pub peak: Peak,
    pub relative: bool,
    pub hold: bool,
    pub range_mode: RangeMode,
    pub operation: Operation,
    pub battery_low: bool,
}

/// A decoded measurement, field names match the published JSON
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub value: f64,
    pub unit: &'static str,
    pub display_value: f64,
    pub display_unit: &'static str,
    pub mode: &'static str,
    #[serde(rename = "currentType")]
    pub current_type: CurrentType,
    pub peak: Peak,
    pub relative: bool,
    pub hold: bool,
    #[serde(rename = "range")]
    pub range_mode: RangeMode,
    pub operation: Operation,
    pub battery_low: bool,
}
