//! Primitive content decoders
//!
//! Counterparts to `encoding`; each function consumes the complete content
//! octets of one value. Zero-length string/octet content decodes to an
//! empty value, never an absent one.

use crate::error::{ber_code, EmberError, EmberResult};
use crate::types::{ber_type, EmberTime, Value};

const MANTISSA_MASK: u64 = 0x000F_FFFF_FFFF_FFFF;
const IMPLICIT_BIT: u64 = 0x0010_0000_0000_0000;

/// Decode a boolean (any non-zero content octet is true)
pub fn decode_boolean(content: &[u8]) -> EmberResult<bool> {
    match content {
        [byte] => Ok(*byte != 0),
        _ => Err(EmberError::ber(
            ber_code::INVALID_VALUE,
            format!("boolean content must be 1 byte, got {}", content.len()),
        )),
    }
}

/// Decode a two's-complement big-endian signed integer
pub fn decode_integer(content: &[u8]) -> EmberResult<i64> {
    if content.is_empty() || content.len() > 8 {
        return Err(EmberError::ber(
            ber_code::INVALID_VALUE,
            format!("integer content of {} bytes", content.len()),
        ));
    }
    let mut value: i64 = if content[0] & 0x80 != 0 { -1 } else { 0 };
    for &byte in content {
        value = (value << 8) | byte as i64;
    }
    Ok(value)
}

/// Decode big-endian unsigned content
fn decode_unsigned(content: &[u8]) -> EmberResult<u64> {
    if content.len() > 8 {
        return Err(EmberError::ber(
            ber_code::INVALID_VALUE,
            "unsigned content exceeds 8 bytes",
        ));
    }
    let mut value: u64 = 0;
    for &byte in content {
        value = (value << 8) | byte as u64;
    }
    Ok(value)
}

/// Decode the Ember+ REAL binary variant (see `encoding::encode_real`)
pub fn decode_real(content: &[u8]) -> EmberResult<f64> {
    if content.is_empty() {
        return Ok(0.0);
    }
    match content[0] {
        0x40 => return Ok(f64::INFINITY),
        0x41 => return Ok(f64::NEG_INFINITY),
        0x42 => return Ok(f64::NAN),
        _ => {}
    }

    let preamble = content[0];
    if (preamble & 0x80) == 0 {
        return Err(EmberError::ber(
            ber_code::UNSUPPORTED,
            "only binary REAL encoding is supported",
        ));
    }
    let exponent_length = 1 + (preamble & 0x03) as usize;
    if content.len() < 1 + exponent_length {
        return Err(EmberError::ber(
            ber_code::INVALID_VALUE,
            "REAL content shorter than its exponent",
        ));
    }

    let exponent = decode_integer(&content[1..1 + exponent_length])?;
    let mut mantissa = decode_unsigned(&content[1 + exponent_length..])?;
    if mantissa == 0 {
        return Ok(0.0);
    }

    // a valid mantissa carries at most 53 significant bits; anything wider
    // could never line up with the implicit bit below
    if mantissa >= IMPLICIT_BIT << 1 {
        return Err(EmberError::ber(
            ber_code::INVALID_VALUE,
            "REAL mantissa exceeds 53 bits",
        ));
    }
    // re-normalize: the encoder stripped trailing zero bits
    while (mantissa & IMPLICIT_BIT) == 0 {
        mantissa <<= 1;
    }
    mantissa &= MANTISSA_MASK;

    let biased = exponent + 1023;
    if !(0..=0x7FF).contains(&biased) {
        return Err(EmberError::ber(
            ber_code::INVALID_VALUE,
            format!("REAL exponent {} out of double range", exponent),
        ));
    }

    let mut bits = ((biased as u64) << 52) | mantissa;
    if (preamble & 0x40) != 0 {
        bits |= 0x8000_0000_0000_0000;
    }
    Ok(f64::from_bits(bits))
}

/// Decode UTF8String content; empty content yields an empty string
pub fn decode_utf8(content: &[u8]) -> EmberResult<String> {
    String::from_utf8(content.to_vec())
        .map_err(|_| EmberError::ber(ber_code::INVALID_VALUE, "invalid UTF-8 in string"))
}

/// Decode relative-OID content
pub fn decode_relative_oid(content: &[u8]) -> EmberResult<Vec<u32>> {
    let mut oid = Vec::new();
    let mut pos = 0;
    while pos < content.len() {
        let (sub, consumed) = decode_multibyte(&content[pos..])?;
        oid.push(sub);
        pos += consumed;
    }
    Ok(oid)
}

/// Decode OBJECT IDENTIFIER content (unpacks the 40*X+Y first pair)
pub fn decode_object_identifier(content: &[u8]) -> EmberResult<Vec<u32>> {
    if content.is_empty() {
        return Ok(Vec::new());
    }
    let (first, mut pos) = decode_multibyte(content)?;
    let mut oid = if first < 80 {
        vec![first / 40, first % 40]
    } else {
        vec![2, first - 80]
    };
    while pos < content.len() {
        let (sub, consumed) = decode_multibyte(&content[pos..])?;
        oid.push(sub);
        pos += consumed;
    }
    Ok(oid)
}

fn decode_multibyte(data: &[u8]) -> EmberResult<(u32, usize)> {
    let mut value: u32 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if i >= 5 {
            return Err(EmberError::ber(
                ber_code::INVALID_VALUE,
                "sub-identifier exceeds 32 bits",
            ));
        }
        if value > u32::MAX >> 7 {
            return Err(EmberError::ber(
                ber_code::INVALID_VALUE,
                "sub-identifier exceeds 32 bits",
            ));
        }
        value = (value << 7) | (byte & 0x7F) as u32;
        if (byte & 0x80) == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(EmberError::ber(
        ber_code::UNEXPECTED_EOF,
        "truncated sub-identifier",
    ))
}

/// Decode a leaf's content octets according to its universal type number.
///
/// Application-typed primitives and unrecognized universal types decode as
/// raw octet strings so third-party extensions survive a round trip.
pub fn decode_value(type_number: u32, content: &[u8]) -> EmberResult<Value> {
    match type_number {
        ber_type::BOOLEAN => Ok(Value::Boolean(decode_boolean(content)?)),
        ber_type::INTEGER => Ok(Value::Integer(decode_integer(content)?)),
        ber_type::REAL => Ok(Value::Real(decode_real(content)?)),
        ber_type::UTF8_STRING => Ok(Value::Utf8String(decode_utf8(content)?)),
        ber_type::OCTET_STRING | ber_type::BIT_STRING => {
            Ok(Value::OctetString(content.to_vec()))
        }
        ber_type::OBJECT_IDENTIFIER => {
            Ok(Value::ObjectIdentifier(decode_object_identifier(content)?))
        }
        ber_type::RELATIVE_OID => Ok(Value::RelativeOid(decode_relative_oid(content)?)),
        ber_type::GENERALIZED_TIME => Ok(Value::Time(EmberTime::from_content(content)?)),
        ber_type::NULL => {
            if content.is_empty() {
                Ok(Value::Null)
            } else {
                Err(EmberError::ber(
                    ber_code::INVALID_VALUE,
                    "NULL content must be empty",
                ))
            }
        }
        other => {
            log::debug!("decoding unknown primitive type {} as octets", other);
            Ok(Value::OctetString(content.to_vec()))
        }
    }
}
