use super::meter_definitions::{OPTION1, OPTION2, OPTION3, OPTION4, STATUS};
use super::structs::RawPacket;
use super::Ut61eParseError;

/// All indicators the status and option bytes can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    Judge,
    Sign,
    Batt,
    Ol,
    Max,
    Min,
    Rel,
    Rmr,
    Ul,
    Pmax,
    Pmin,
    Dc,
    Ac,
    Auto,
    Vahz,
    Vbar,
    Hold,
    Lpf,
}

impl Flag {
    pub const ALL: [Flag; 18] = [
        Flag::Judge, Flag::Sign, Flag::Batt, Flag::Ol,
        Flag::Max, Flag::Min, Flag::Rel, Flag::Rmr,
        Flag::Ul, Flag::Pmax, Flag::Pmin,
        Flag::Dc, Flag::Ac, Flag::Auto, Flag::Vahz,
        Flag::Vbar, Flag::Hold, Flag::Lpf,
    ];

    fn mask(self) -> u32 {
        1 << (self as u32)
    }

    pub fn name(self) -> &'static str {
        match self {
            Flag::Judge => "JUDGE",
            Flag::Sign => "SIGN",
            Flag::Batt => "BATT",
            Flag::Ol => "OL",
            Flag::Max => "MAX",
            Flag::Min => "MIN",
            Flag::Rel => "REL",
            Flag::Rmr => "RMR",
            Flag::Ul => "UL",
            Flag::Pmax => "PMAX",
            Flag::Pmin => "PMIN",
            Flag::Dc => "DC",
            Flag::Ac => "AC",
            Flag::Auto => "AUTO",
            Flag::Vahz => "VAHZ",
            Flag::Vbar => "VBAR",
            Flag::Hold => "HOLD",
            Flag::Lpf => "LPF",
        }
    }
}

/// Meaning of one bit inside a status/option byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitLabel {
    /// Protocol constant, used as a sanity check
    Fixed(bool),
    Named(Flag),
}

/// Labels for the 7 data bits, most significant first
pub type Template = [BitLabel; 7];

/// Set of decoded flags. `known` tracks which flags were read from a byte
/// at all, `set` holds their values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NamedFlags {
    known: u32,
    set: u32,
}

impl NamedFlags {
    pub fn new() -> Self {
        return NamedFlags { known: 0, set: 0 };
    }

    pub fn insert(&mut self, flag: Flag, value: bool) {
        self.known |= flag.mask();
        if value {
            self.set |= flag.mask();
        } else {
            self.set &= !flag.mask();
        }
    }

    pub fn is_set(&self, flag: Flag) -> bool {
        return self.set & flag.mask() != 0;
    }

    pub fn contains(&self, flag: Flag) -> bool {
        return self.known & flag.mask() != 0;
    }

    pub fn merge(&mut self, other: NamedFlags) {
        debug_assert!(self.known & other.known == 0, "flag decoded from two different bytes");
        self.known |= other.known;
        self.set |= other.set;
    }

    /// Names of all flags which are set, handy for logging
    pub fn active(&self) -> Vec<&'static str> {
        return Flag::ALL.iter()
            .filter(|f| self.is_set(**f))
            .map(|f| f.name())
            .collect();
    }
}

/// Extracts the named bits of `byte` according to `template` and checks
/// the fixed ones.
pub fn extract(byte: u8, template: &Template) -> Result<NamedFlags, Ut61eParseError> {
    let mut flags = NamedFlags::new();

    for (i, label) in template.iter().enumerate() {
        let position = (6 - i) as u8;
        let bit = byte & (1 << position) != 0;

        match label {
            BitLabel::Fixed(expected) => {
                if bit != *expected {
                    return Err(Ut61eParseError::MalformedFixedBit { byte, position });
                }
            }
            BitLabel::Named(flag) => flags.insert(*flag, bit),
        }
    }

    Ok(flags)
}

/// Runs all five status/option bytes of a packet through their templates
pub fn extract_packet_flags(packet: &RawPacket) -> Result<NamedFlags, Ut61eParseError> {
    let mut flags = extract(packet.status, &STATUS)?;
    flags.merge(extract(packet.option1, &OPTION1)?);
    flags.merge(extract(packet.option2, &OPTION2)?);
    flags.merge(extract(packet.option3, &OPTION3)?);
    flags.merge(extract(packet.option4, &OPTION4)?);
    Ok(flags)
}
