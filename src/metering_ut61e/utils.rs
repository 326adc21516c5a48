use super::meter_definitions::get_digit;
use super::structs::{RangeEntry, RawPacket};
use super::Ut61eParseError;
use log::debug;

/// Turns the five LCD digit codes (digit4 first) into the unsigned number shown on the display
pub fn decode_digits(codes: &[u8; 5]) -> Result<u32, Ut61eParseError> {
    let mut number: u32 = 0;
    for code in codes {
        let digit = get_digit(*code).ok_or(Ut61eParseError::InvalidDigitCode(*code))?;
        number = number * 10 + digit as u32;
    }
    Ok(number)
}

/// Returns `(display_value, value)`, the second one scaled to the base unit
pub fn assemble_value(codes: &[u8; 5], range: &RangeEntry, negative: bool) -> Result<(f64, f64), Ut61eParseError> {
    let mut number = decode_digits(codes)? as i64;
    if negative {
        number = -number;
    }

    let display_value = number as f64 / 10f64.powi(range.decimal_position as i32);
    let value = display_value * range.multiplier;

    debug!("Digits {number} with {} decimals -> {display_value}{} ({value})",
        range.decimal_position, range.display_unit);

    return Ok((display_value, value));
}

/// Text as shown on the LCD, e.g. "-2.2000". Not used for any calculation.
pub fn format_display(codes: &[u8; 5], decimal_position: u8, negative: bool) -> Result<String, Ut61eParseError> {
    let mut text = String::with_capacity(7);
    if negative {
        text.push('-');
    }

    let point_after = 5usize.saturating_sub(decimal_position as usize);
    for (i, code) in codes.iter().enumerate() {
        if i == point_after && decimal_position > 0 {
            text.push('.');
        }
        let digit = get_digit(*code).ok_or(Ut61eParseError::InvalidDigitCode(*code))?;
        text.push(char::from(b'0' + digit));
    }

    Ok(text)
}

/// Packets arrive as hex strings over MQTT, whitespace between bytes is allowed
pub fn packet_from_hex(payload: &str) -> Result<RawPacket, Ut61eParseError> {
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(&cleaned).map_err(|_| Ut61eParseError::InvalidHex(payload.to_string()))?;
    RawPacket::from_bytes(&bytes)
}
