use super::bitfield::{extract_packet_flags, Flag, NamedFlags};
use super::meter_definitions::{self, DUTY_CYCLE_RANGE, FREQUENCY_FUNCTION, TEMPERATURE_RANGE, TEMPERATURE_RANGE_VBAR};
use super::structs::*;
use super::utils;
use super::Ut61eParseError;
use log::{debug, log_enabled, Level};

/// Measurement mode, unit and range as selected by dial, buttons and range byte
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFunction {
    pub mode: &'static str,
    pub unit: &'static str,
    pub range: RangeEntry,
}

pub fn resolve_function(function: u8, range: u8, flags: &NamedFlags) -> Result<ResolvedFunction, Ut61eParseError> {
    let mut dial = meter_definitions::get_function(function)
        .ok_or(Ut61eParseError::UnknownFunctionCode(function))?;

    /* With the dial on voltage or current, the Hz button switches to
       frequency but the function byte keeps the dial position */
    if flags.is_set(Flag::Vahz) {
        dial = meter_definitions::get_function(FREQUENCY_FUNCTION)
            .ok_or(Ut61eParseError::UnknownFunctionCode(FREQUENCY_FUNCTION))?;
    }

    if dial.mode == "frequency" && flags.is_set(Flag::Judge) {
        return Ok(ResolvedFunction { mode: "duty_cycle", unit: "%", range: DUTY_CYCLE_RANGE });
    }

    // The meter uses two digit layouts for temperature, the range byte says nothing about it
    if dial.mode == "temperature" {
        let range = match flags.is_set(Flag::Vbar) {
            true => TEMPERATURE_RANGE_VBAR,
            false => TEMPERATURE_RANGE,
        };
        return Ok(ResolvedFunction { mode: dial.mode, unit: dial.unit, range });
    }

    let entry = dial.get_range(range)
        .ok_or(Ut61eParseError::UnknownRangeCode { function, range })?;

    Ok(ResolvedFunction { mode: dial.mode, unit: dial.unit, range: entry.clone() })
}

pub fn interpret_flags(flags: &NamedFlags) -> Result<MeterStatus, Ut61eParseError> {
    let current_type = match (flags.is_set(Flag::Dc), flags.is_set(Flag::Ac)) {
        (true, true) => return Err(Ut61eParseError::ConflictingPolarity),
        (true, false) => CurrentType::DC,
        (false, true) => CurrentType::AC,
        (false, false) => CurrentType::None,
    };

    // UL and OL together is a display glitch of the meter, not an error
    if flags.is_set(Flag::Ul) && flags.is_set(Flag::Ol) {
        debug!("UL and OL both set, treating as underload");
    }
    let operation = if flags.is_set(Flag::Ul) {
        Operation::Underload
    } else if flags.is_set(Flag::Ol) {
        Operation::Overload
    } else {
        Operation::Normal
    };

    let peak = if flags.is_set(Flag::Max) || flags.is_set(Flag::Pmax) {
        Peak::Max
    } else if flags.is_set(Flag::Min) || flags.is_set(Flag::Pmin) {
        Peak::Min
    } else {
        Peak::None
    };

    let range_mode = match flags.is_set(Flag::Auto) {
        true => RangeMode::Auto,
        false => RangeMode::Manual,
    };

    Ok(MeterStatus {
        current_type,
        peak,
        relative: flags.is_set(Flag::Rel),
        hold: flags.is_set(Flag::Hold),
        range_mode,
        operation,
        battery_low: flags.is_set(Flag::Batt),
    })
}

/// Parses one 12 byte packet of the UT61E into a [`Reading`]
pub fn decode_packet(packet: &RawPacket) -> Result<Reading, Ut61eParseError> {
    let flags = extract_packet_flags(packet)?;
    debug!("Flags set: {:?}", flags.active());

    let function = resolve_function(packet.function, packet.range, &flags)?;
    let status = interpret_flags(&flags)?;
    let negative = flags.is_set(Flag::Sign);
    let (mut display_value, mut value) = utils::assemble_value(&packet.digits, &function.range, negative)?;

    if log_enabled!(Level::Debug) {
        if let Ok(text) = utils::format_display(&packet.digits, function.range.decimal_position, negative) {
            debug!("LCD shows {text} {} ({})", function.range.display_unit, function.mode);
        }
    }

    /* The LCD shows OL/UL instead of a number */
    if status.operation != Operation::Normal {
        debug!("Meter reports {:?}, value is zeroed", status.operation);
        display_value = 0.0;
        value = 0.0;
    }

    return Ok(Reading {
        value,
        unit: function.unit,
        display_value,
        display_unit: function.range.display_unit,
        mode: function.mode,
        current_type: status.current_type,
        peak: status.peak,
        relative: status.relative,
        hold: status.hold,
        range_mode: status.range_mode,
        operation: status.operation,
        battery_low: status.battery_low,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE: u8 = 0b0110000;

    /// Packet builder, all status/option bytes start with only their fixed bits
    fn packet(range: u8, digits: &[u8; 5], function: u8) -> [u8; PACKET_LEN] {
        [range, digits[0], digits[1], digits[2], digits[3], digits[4], function, IDLE, IDLE, IDLE, IDLE, IDLE]
    }

    fn flags(list: &[Flag]) -> NamedFlags {
        let mut f = NamedFlags::new();
        for flag in list {
            f.insert(*flag, true);
        }
        f
    }

    #[test]
    fn test_voltage_reading() {
        let mut bytes = packet(0x30, b"22000", 0x3B);
        bytes[10] = 0b0111010; // DC + AUTO
        let reading = decode_packet(&RawPacket::new(bytes)).unwrap();

        assert_eq!(reading.mode, "voltage");
        assert_eq!(reading.unit, "V");
        assert_eq!(reading.display_unit, "V");
        assert_eq!(reading.display_value, 2.2);
        assert_eq!(reading.value, 2.2);
        assert_eq!(reading.operation, Operation::Normal);
        assert_eq!(reading.current_type, CurrentType::DC);
        assert_eq!(reading.range_mode, RangeMode::Auto);
        assert!(!reading.battery_low);
    }

    #[test]
    fn test_millivolt_normalized() {
        let reading = decode_packet(&RawPacket::new(packet(0x34, b"12345", 0x3B))).unwrap();
        assert_eq!(reading.display_unit, "mV");
        assert_eq!(reading.display_value, 123.45);
        assert_eq!(reading.value, 123.45 * 1e-3);
        assert_eq!(reading.range_mode, RangeMode::Manual);
    }

    #[test]
    fn test_duty_cycle() {
        let mut bytes = packet(0x30, b"00505", FREQUENCY_FUNCTION);
        bytes[7] = 0b0111000; // JUDGE
        let reading = decode_packet(&RawPacket::new(bytes)).unwrap();

        assert_eq!(reading.mode, "duty_cycle");
        assert_eq!(reading.unit, "%");
        assert_eq!(reading.display_unit, "%");
        assert_eq!(reading.display_value, 50.5);
    }

    #[test]
    fn test_duty_cycle_ignores_range_byte() {
        let f = flags(&[Flag::Judge]);
        let resolved = resolve_function(FREQUENCY_FUNCTION, 0x32, &f).unwrap();
        assert_eq!(resolved.range, DUTY_CYCLE_RANGE);
    }

    #[test]
    fn test_vahz_switches_to_frequency() {
        let f = flags(&[Flag::Vahz]);
        let resolved = resolve_function(0x3B, 0x33, &f).unwrap();
        assert_eq!(resolved.mode, "frequency");
        assert_eq!(resolved.unit, "Hz");
        assert_eq!(resolved.range, RangeEntry::new(1e3, 3, "kHz"));

        let f = flags(&[Flag::Vahz, Flag::Judge]);
        assert_eq!(resolve_function(0x39, 0x30, &f).unwrap().mode, "duty_cycle");
    }

    #[test]
    fn test_temperature_layouts() {
        let with_vbar = resolve_function(0x34, 0x35, &flags(&[Flag::Vbar])).unwrap();
        assert_eq!(with_vbar.mode, "temperature");
        assert_eq!(with_vbar.range, RangeEntry::new(1e0, 1, "deg"));

        let without = resolve_function(0x34, 0x30, &flags(&[])).unwrap();
        assert_eq!(without.range, RangeEntry::new(1e0, 2, "deg"));
    }

    #[test]
    fn test_conflicting_polarity() {
        let mut bytes = packet(0x30, b"22000", 0x3B);
        bytes[10] = 0b0111100; // DC + AC
        let result = decode_packet(&RawPacket::new(bytes));
        assert!(matches!(result, Err(Ut61eParseError::ConflictingPolarity)));
    }

    #[test]
    fn test_underload_and_overload_glitch() {
        let mut bytes = packet(0x30, b"22000", 0x3B);
        bytes[7] = 0b0110001; // OL
        bytes[9] = 0b0111000; // UL
        let reading = decode_packet(&RawPacket::new(bytes)).unwrap();

        assert_eq!(reading.operation, Operation::Underload);
        assert_eq!(reading.value, 0.0);
        assert_eq!(reading.display_value, 0.0);
        assert_eq!(reading.mode, "voltage");
        assert_eq!(reading.display_unit, "V");
    }

    #[test]
    fn test_overload() {
        let mut bytes = packet(0x33, b"99999", 0x33);
        bytes[7] = 0b0110001; // OL
        let reading = decode_packet(&RawPacket::new(bytes)).unwrap();
        assert_eq!(reading.operation, Operation::Overload);
        assert_eq!(reading.value, 0.0);
        assert_eq!(reading.display_unit, "kΩ");
    }

    #[test]
    fn test_unknown_function() {
        let result = decode_packet(&RawPacket::new(packet(0x30, b"22000", 0x37)));
        assert!(matches!(result, Err(Ut61eParseError::UnknownFunctionCode(0x37))));
    }

    #[test]
    fn test_unknown_range() {
        let result = decode_packet(&RawPacket::new(packet(0x37, b"22000", 0x3B)));
        assert!(matches!(result, Err(Ut61eParseError::UnknownRangeCode { function: 0x3B, range: 0x37 })));
    }

    #[test]
    fn test_invalid_digit() {
        let result = decode_packet(&RawPacket::new(packet(0x30, b"22A00", 0x3B)));
        assert!(matches!(result, Err(Ut61eParseError::InvalidDigitCode(0x41))));
    }

    #[test]
    fn test_malformed_fixed_bit() {
        let mut bytes = packet(0x30, b"22000", 0x3B);
        bytes[11] = 0b0111000;
        let result = decode_packet(&RawPacket::new(bytes));
        assert!(matches!(result, Err(Ut61eParseError::MalformedFixedBit { byte: 0b0111000, position: 3 })));
    }

    #[test]
    fn test_sign_only_negates_values() {
        let plain = packet(0x31, b"12345", 0x3B);
        let mut signed = plain;
        signed[7] = 0b0110100; // SIGN

        let a = decode_packet(&RawPacket::new(plain)).unwrap();
        let b = decode_packet(&RawPacket::new(signed)).unwrap();
        assert_eq!(b.value, -a.value);
        assert_eq!(b.display_value, -a.display_value);
        assert_eq!(Reading { value: a.value, display_value: a.display_value, ..b }, a);
    }

    #[test]
    fn test_signed_zero_publishes_plain_zero() {
        let mut bytes = packet(0x30, b"00000", 0x3B);
        bytes[7] = 0b0110100; // SIGN
        let reading = decode_packet(&RawPacket::new(bytes)).unwrap();
        assert!(reading.value.is_sign_positive());
        assert!(reading.display_value.is_sign_positive());

        let json = serde_json::to_string(&reading).unwrap();
        assert!(json.contains("\"value\":0.0"), "{json}");
        assert!(!json.contains("-0.0"), "{json}");
    }

    #[test]
    fn test_decode_is_deterministic() {
        let mut bytes = packet(0x32, b"04711", 0x36);
        bytes[8] = 0b0110010; // REL
        bytes[11] = 0b0110010; // HOLD
        let first = decode_packet(&RawPacket::new(bytes)).unwrap();
        let second = decode_packet(&RawPacket::new(bytes)).unwrap();
        assert_eq!(first, second);
        assert!(first.relative);
        assert!(first.hold);
        assert_eq!(first.display_unit, "µF");
    }

    #[test]
    fn test_peak_flags() {
        assert_eq!(interpret_flags(&flags(&[Flag::Max])).unwrap().peak, Peak::Max);
        assert_eq!(interpret_flags(&flags(&[Flag::Pmin])).unwrap().peak, Peak::Min);
        assert_eq!(interpret_flags(&flags(&[])).unwrap().peak, Peak::None);
    }

    #[test]
    fn test_status_flags() {
        let status = interpret_flags(&flags(&[Flag::Batt, Flag::Ac, Flag::Auto])).unwrap();
        assert!(status.battery_low);
        assert_eq!(status.current_type, CurrentType::AC);
        assert_eq!(status.range_mode, RangeMode::Auto);
        assert_eq!(status.operation, Operation::Normal);
    }
}
