//! Primitive content encoders
//!
//! These functions append the *content octets* of a value to a buffer; tag
//! and length octets are written by the tree encoder in `node.rs`. The
//! integer encodings are minimal two's-complement big-endian as required by
//! canonical ASN.1 INTEGER form, and the REAL encoding reproduces the exact
//! binary variant used by the other Ember+ stacks, which is interop-critical.

use crate::types::{EmberTime, Value};

const MANTISSA_MASK: u64 = 0x000F_FFFF_FFFF_FFFF;
const IMPLICIT_BIT: u64 = 0x0010_0000_0000_0000;

/// Minimal number of two's-complement bytes needed for a signed value
pub fn signed_length(value: i64) -> usize {
    let mut length = 8;
    let mut mask = 0xFF80_0000_0000_0000u64;
    let bits = value as u64;

    // drop leading bytes that are pure sign extension
    while length > 1 {
        let top9 = bits & mask;
        if top9 != 0 && top9 != mask {
            break;
        }
        mask >>= 8;
        length -= 1;
    }
    length
}

/// Encode a signed integer as minimal two's-complement big-endian
pub fn encode_integer(out: &mut Vec<u8>, value: i64) {
    let length = signed_length(value);
    for i in (0..length).rev() {
        out.push((value >> (i * 8)) as u8);
    }
}

/// Encode an unsigned value as minimal big-endian (no sign byte)
fn encode_unsigned(out: &mut Vec<u8>, value: u64) {
    let mut length = 1;
    while length < 8 && (value >> (length * 8)) != 0 {
        length += 1;
    }
    for i in (0..length).rev() {
        out.push((value >> (i * 8)) as u8);
    }
}

/// Encode a boolean (0xFF for true, 0x00 for false)
pub fn encode_boolean(out: &mut Vec<u8>, value: bool) {
    out.push(if value { 0xFF } else { 0x00 });
}

/// Encode an IEEE-754 double in the Ember+ REAL binary variant.
///
/// Zero encodes as empty content. Infinities and NaN use the special
/// octets 0x40/0x41/0x42. All other values emit:
/// - preamble `0x80 | sign(0x40) | (exponent_length - 1)`
/// - the unbiased IEEE exponent as minimal signed big-endian
/// - the 53-bit mantissa with the implicit leading bit restored and
///   trailing zero bits stripped, as minimal unsigned big-endian
///
/// The decoder re-normalizes the mantissa by shifting left until the
/// leading bit reaches position 52, so the exponent is stored unadjusted.
pub fn encode_real(out: &mut Vec<u8>, value: f64) {
    if value == 0.0 {
        return;
    }
    if value.is_infinite() {
        out.push(if value > 0.0 { 0x40 } else { 0x41 });
        return;
    }
    if value.is_nan() {
        out.push(0x42);
        return;
    }

    let bits = value.to_bits();
    let exponent = ((bits >> 52) & 0x7FF) as i64 - 1023;
    let mut mantissa = (bits & MANTISSA_MASK) | IMPLICIT_BIT;

    while (mantissa & 0xFF) == 0 {
        mantissa >>= 8;
    }
    while (mantissa & 0x01) == 0 {
        mantissa >>= 1;
    }

    let exponent_length = signed_length(exponent);
    let mut preamble = 0x80 | (exponent_length as u8 - 1);
    if (bits & 0x8000_0000_0000_0000) != 0 {
        preamble |= 0x40;
    }

    out.push(preamble);
    encode_integer(out, exponent);
    encode_unsigned(out, mantissa);
}

/// Encode relative-OID content: base-128 varint per sub-identifier
pub fn encode_relative_oid(out: &mut Vec<u8>, oid: &[u32]) {
    for &sub in oid {
        encode_multibyte(out, sub);
    }
}

/// Encode OBJECT IDENTIFIER content (first two arcs packed as 40*X+Y)
pub fn encode_object_identifier(out: &mut Vec<u8>, oid: &[u32]) {
    match oid {
        [] => {}
        [first] => encode_multibyte(out, first * 40),
        [first, second, rest @ ..] => {
            encode_multibyte(out, first * 40 + second);
            for &sub in rest {
                encode_multibyte(out, sub);
            }
        }
    }
}

/// Base-128 with MSB continuation, most significant group first
fn encode_multibyte(out: &mut Vec<u8>, value: u32) {
    let mut groups = [0u8; 5];
    let mut count = 0;
    let mut remaining = value;
    loop {
        groups[count] = (remaining & 0x7F) as u8;
        remaining >>= 7;
        count += 1;
        if remaining == 0 {
            break;
        }
    }
    for i in (0..count).rev() {
        if i > 0 {
            out.push(groups[i] | 0x80);
        } else {
            out.push(groups[i]);
        }
    }
}

/// Encode a generalized time value as its ASCII content
pub fn encode_time(out: &mut Vec<u8>, time: &EmberTime) {
    out.extend_from_slice(&time.to_content());
}

/// Encode any leaf value's content octets
pub fn encode_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Boolean(v) => encode_boolean(out, *v),
        Value::Integer(v) => encode_integer(out, *v),
        Value::Real(v) => encode_real(out, *v),
        Value::Utf8String(v) => out.extend_from_slice(v.as_bytes()),
        Value::OctetString(v) => out.extend_from_slice(v),
        Value::ObjectIdentifier(v) => encode_object_identifier(out, v),
        Value::RelativeOid(v) => encode_relative_oid(out, v),
        Value::Time(t) => encode_time(out, t),
        Value::Null => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoding;

    #[test]
    fn test_signed_length_minimal() {
        assert_eq!(signed_length(0), 1);
        assert_eq!(signed_length(127), 1);
        assert_eq!(signed_length(128), 2);
        assert_eq!(signed_length(-128), 1);
        assert_eq!(signed_length(-129), 2);
        assert_eq!(signed_length(i64::MAX), 8);
        assert_eq!(signed_length(i64::MIN), 8);
    }

    #[test]
    fn test_integer_sign_disambiguation() {
        let mut buf = Vec::new();
        encode_integer(&mut buf, 128);
        assert_eq!(buf, vec![0x00, 0x80]);

        buf.clear();
        encode_integer(&mut buf, -1);
        assert_eq!(buf, vec![0xFF]);

        buf.clear();
        encode_integer(&mut buf, 256);
        assert_eq!(buf, vec![0x01, 0x00]);
    }

    #[test]
    fn test_real_zero_is_empty() {
        let mut buf = Vec::new();
        encode_real(&mut buf, 0.0);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_real_infinities() {
        let mut buf = Vec::new();
        encode_real(&mut buf, f64::INFINITY);
        assert_eq!(buf, vec![0x40]);
        buf.clear();
        encode_real(&mut buf, f64::NEG_INFINITY);
        assert_eq!(buf, vec![0x41]);
        buf.clear();
        encode_real(&mut buf, f64::NAN);
        assert_eq!(buf, vec![0x42]);
    }

    #[test]
    fn test_real_roundtrip_bit_for_bit() {
        for value in [
            32.1,
            -0.54321,
            1.0,
            -1.0,
            3.0,
            0.1,
            1e-300,
            1e300,
            f64::MIN_POSITIVE,
            std::f64::consts::PI,
        ] {
            let mut buf = Vec::new();
            encode_real(&mut buf, value);
            let decoded = decoding::decode_real(&buf).unwrap();
            assert_eq!(
                decoded.to_bits(),
                value.to_bits(),
                "roundtrip failed for {}",
                value
            );
        }
    }

    #[test]
    fn test_oid_first_pair_packing() {
        let mut buf = Vec::new();
        encode_object_identifier(&mut buf, &[1, 2, 840, 113549]);
        assert_eq!(buf[0], 42); // 1*40 + 2
        let decoded = decoding::decode_object_identifier(&buf).unwrap();
        assert_eq!(decoded, vec![1, 2, 840, 113549]);
    }

    #[test]
    fn test_relative_oid_roundtrip() {
        let mut buf = Vec::new();
        encode_relative_oid(&mut buf, &[1, 5, 300, 0, 1_000_000]);
        let decoded = decoding::decode_relative_oid(&buf).unwrap();
        assert_eq!(decoded, vec![1, 5, 300, 0, 1_000_000]);
    }
}
