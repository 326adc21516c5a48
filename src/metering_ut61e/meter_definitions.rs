use super::bitfield::{BitLabel::{Fixed, Named}, Flag, Template};
use super::structs::{FunctionEntry, RangeEntry, RangeTable};
use lazy_static::lazy_static;
use std::collections::HashMap;

/* Status and option bytes of the ES51922 as used by the UT61E */
pub const STATUS: Template = [Fixed(false), Fixed(true), Fixed(true), Named(Flag::Judge), Named(Flag::Sign), Named(Flag::Batt), Named(Flag::Ol)];
pub const OPTION1: Template = [Fixed(false), Fixed(true), Fixed(true), Named(Flag::Max), Named(Flag::Min), Named(Flag::Rel), Named(Flag::Rmr)];
pub const OPTION2: Template = [Fixed(false), Fixed(true), Fixed(true), Named(Flag::Ul), Named(Flag::Pmax), Named(Flag::Pmin), Fixed(false)];
pub const OPTION3: Template = [Fixed(false), Fixed(true), Fixed(true), Named(Flag::Dc), Named(Flag::Ac), Named(Flag::Auto), Named(Flag::Vahz)];
pub const OPTION4: Template = [Fixed(false), Fixed(true), Fixed(true), Fixed(false), Named(Flag::Vbar), Named(Flag::Hold), Named(Flag::Lpf)];

/// LCD digit codes, '0' to '9'
pub const LCD_DIGITS: [(u8, u8); 10] = [
    (0b0110000, 0),
    (0b0110001, 1),
    (0b0110010, 2),
    (0b0110011, 3),
    (0b0110100, 4),
    (0b0110101, 5),
    (0b0110110, 6),
    (0b0110111, 7),
    (0b0111000, 8),
    (0b0111001, 9),
];

pub fn get_digit(code: u8) -> Option<u8> {
    LCD_DIGITS.iter()
        .find(|(c, _)| *c == code)
        .map(|(_, digit)| *digit)
}

/// The Hz button keeps the dial code, so this one is used instead when VAHZ is set
pub const FREQUENCY_FUNCTION: u8 = 0b0110010;

pub const DUTY_CYCLE_RANGE: RangeEntry = RangeEntry::new(1e0, 1, "%");
pub const TEMPERATURE_RANGE_VBAR: RangeEntry = RangeEntry::new(1e0, 1, "deg"); // 2200.0
pub const TEMPERATURE_RANGE: RangeEntry = RangeEntry::new(1e0, 2, "deg"); // 220.00

const RANGE_VOLTAGE: RangeTable = &[
    (0b0110000, RangeEntry::new(1e0, 4, "V")),  // 2.2000V
    (0b0110001, RangeEntry::new(1e0, 3, "V")),  // 22.000V
    (0b0110010, RangeEntry::new(1e0, 2, "V")),  // 220.00V
    (0b0110011, RangeEntry::new(1e0, 1, "V")),  // 2200.0V
    (0b0110100, RangeEntry::new(1e-3, 2, "mV")), // 220.00mV
];

// not in the datasheet
const RANGE_CURRENT_AUTO_UA: RangeTable = &[
    (0b0110000, RangeEntry::new(1e-6, 2, "µA")), // 220.00µA
    (0b0110001, RangeEntry::new(1e-6, 1, "µA")), // 2200.0µA
];

// not in the datasheet
const RANGE_CURRENT_AUTO_MA: RangeTable = &[
    (0b0110000, RangeEntry::new(1e-3, 3, "mA")), // 22.000mA
    (0b0110001, RangeEntry::new(1e-3, 2, "mA")), // 220.00mA
];

const RANGE_CURRENT_22A: RangeTable = &[
    (0b0110000, RangeEntry::new(1e0, 3, "A")), // 22.000A
];

const RANGE_CURRENT_MANUAL: RangeTable = &[
    (0b0110000, RangeEntry::new(1e0, 4, "A")), // 2.2000A
    (0b0110001, RangeEntry::new(1e0, 3, "A")), // 22.000A
    (0b0110010, RangeEntry::new(1e0, 2, "A")), // 220.00A
    (0b0110011, RangeEntry::new(1e0, 1, "A")), // 2200.0A
    (0b0110100, RangeEntry::new(1e0, 0, "A")), // 22000A
];

const RANGE_ADP: RangeTable = &[
    (0b0110000, RangeEntry::new(1e0, 0, "ADP4")),
    (0b0110001, RangeEntry::new(1e0, 0, "ADP3")),
    (0b0110010, RangeEntry::new(1e0, 0, "ADP2")),
    (0b0110011, RangeEntry::new(1e0, 0, "ADP1")),
    (0b0110100, RangeEntry::new(1e0, 0, "ADP0")),
];

const RANGE_RESISTANCE: RangeTable = &[
    (0b0110000, RangeEntry::new(1e0, 2, "Ω")),  // 220.00Ω
    (0b0110001, RangeEntry::new(1e3, 4, "kΩ")), // 2.2000kΩ
    (0b0110010, RangeEntry::new(1e3, 3, "kΩ")), // 22.000kΩ
    (0b0110011, RangeEntry::new(1e3, 2, "kΩ")), // 220.00kΩ
    (0b0110100, RangeEntry::new(1e6, 4, "MΩ")), // 2.2000MΩ
    (0b0110101, RangeEntry::new(1e6, 3, "MΩ")), // 22.000MΩ
    (0b0110110, RangeEntry::new(1e6, 2, "MΩ")), // 220.00MΩ
];

// 0b0110010 is not used by the meter
const RANGE_FREQUENCY: RangeTable = &[
    (0b0110000, RangeEntry::new(1e0, 2, "Hz")),  // 22.00Hz
    (0b0110001, RangeEntry::new(1e0, 1, "Hz")),  // 220.0Hz
    (0b0110011, RangeEntry::new(1e3, 3, "kHz")), // 22.000kHz
    (0b0110100, RangeEntry::new(1e3, 2, "kHz")), // 220.00kHz
    (0b0110101, RangeEntry::new(1e6, 4, "MHz")), // 2.2000MHz
    (0b0110110, RangeEntry::new(1e6, 3, "MHz")), // 22.000MHz
    (0b0110111, RangeEntry::new(1e6, 2, "MHz")), // 220.00MHz
];

const RANGE_CAPACITANCE: RangeTable = &[
    (0b0110000, RangeEntry::new(1e-9, 3, "nF")), // 22.000nF
    (0b0110001, RangeEntry::new(1e-9, 2, "nF")), // 220.00nF
    (0b0110010, RangeEntry::new(1e-6, 4, "µF")), // 2.2000µF
    (0b0110011, RangeEntry::new(1e-6, 3, "µF")), // 22.000µF
    (0b0110100, RangeEntry::new(1e-6, 2, "µF")), // 220.00µF
    (0b0110101, RangeEntry::new(1e-3, 4, "mF")), // 2.2000mF
    (0b0110110, RangeEntry::new(1e-3, 3, "mF")), // 22.000mF
    (0b0110111, RangeEntry::new(1e-3, 2, "mF")), // 220.00mF
];

// Diode and continuity have a fixed full scale, the range byte is always 0b0110000
const RANGE_DIODE: RangeTable = &[
    (0b0110000, RangeEntry::new(1e0, 4, "V")), // 2.2000V
];

const RANGE_CONTINUITY: RangeTable = &[
    (0b0110000, RangeEntry::new(1e0, 2, "Ω")), // 220.00Ω
];

// Temperature is always replaced depending on VBAR, see the parser
const RANGE_TEMPERATURE: RangeTable = &[
    (0b0110000, RangeEntry::new(1e0, 2, "deg")),
];

fn function(mode: &'static str, ranges: RangeTable, unit: &'static str) -> FunctionEntry {
    FunctionEntry { mode, ranges, unit }
}

lazy_static! {
    pub static ref DIAL_FUNCTIONS: HashMap<u8, FunctionEntry> = {
        let mut functions = HashMap::new();
        functions.insert(0b0111011, function("voltage", RANGE_VOLTAGE, "V"));
        functions.insert(0b0111101, function("current", RANGE_CURRENT_AUTO_UA, "A")); // auto µA
        functions.insert(0b0111111, function("current", RANGE_CURRENT_AUTO_MA, "A")); // auto mA
        functions.insert(0b0110000, function("current", RANGE_CURRENT_22A, "A"));
        functions.insert(0b0111001, function("current", RANGE_CURRENT_MANUAL, "A"));
        functions.insert(0b0110011, function("resistance", RANGE_RESISTANCE, "Ω"));
        functions.insert(0b0110101, function("continuity", RANGE_CONTINUITY, "Ω"));
        functions.insert(0b0110001, function("diode", RANGE_DIODE, "V"));
        functions.insert(FREQUENCY_FUNCTION, function("frequency", RANGE_FREQUENCY, "Hz"));
        functions.insert(0b0110110, function("capacitance", RANGE_CAPACITANCE, "F"));
        functions.insert(0b0110100, function("temperature", RANGE_TEMPERATURE, "deg"));
        functions.insert(0b0111110, function("ADP", RANGE_ADP, ""));
        functions
    };
}

pub fn get_function(code: u8) -> Option<&'static FunctionEntry> {
    DIAL_FUNCTIONS.get(&code)
}
