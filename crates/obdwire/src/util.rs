// crates/obdwire/src/util.rs

//! Byte-string and numeric-literal helpers shared by the codec, the loader
//! and transport adapters.

use crate::error::ObdError;

/// Formats a byte as exactly two uppercase hex digits.
pub fn hex_of_byte(byte: u8) -> String {
    hex::encode_upper([byte])
}

/// Parses exactly two hex digits (either case) into a byte.
pub fn byte_of_hex(s: &str) -> Result<u8, ObdError> {
    if s.len() != 2 {
        return Err(ObdError::InvalidHex(s.to_string()));
    }
    let decoded = hex::decode(s).map_err(|_| ObdError::InvalidHex(s.to_string()))?;
    Ok(decoded[0])
}

/// Uppercase hex rendering of a byte sequence, every byte followed by one
/// space: `[0x48, 0x6B, 0x10]` becomes `"48 6B 10 "`.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for byte in bytes {
        out.push_str(&hex_of_byte(*byte));
        out.push(' ');
    }
    out
}

/// Parses a `0b...` binary, `0x...` hex or plain decimal literal.
pub fn parse_uint_literal(s: &str) -> Option<u32> {
    if let Some(bin) = s.strip_prefix("0b") {
        u32::from_str_radix(bin, 2).ok()
    } else if let Some(hexadecimal) = s.strip_prefix("0x") {
        u32::from_str_radix(hexadecimal, 16).ok()
    } else {
        s.parse().ok()
    }
}

/// Like [`parse_uint_literal`], restricted to the byte range.
pub fn parse_byte_literal(s: &str) -> Option<u8> {
    parse_uint_literal(s).and_then(|v| u8::try_from(v).ok())
}
