//! BER tag and length value types

use crate::error::{ber_code, EmberError, EmberResult};
use std::cmp::Ordering;

/// Bit 5 of the tag preamble marks a constructed (container) encoding
pub const CONTAINER_FLAG: u8 = 0x20;

/// BER Tag Class
///
/// ASN.1 defines four tag classes:
/// - **Universal**: Standard ASN.1 types (INTEGER, OCTET STRING, etc.)
/// - **Application**: Application-specific types (the Glow schema lives here)
/// - **Context-specific**: Context-dependent types (field tags in SEQUENCE/SET)
/// - **Private**: Private/implementation-specific types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BerClass {
    /// Universal class (00)
    Universal = 0,
    /// Application class (01)
    Application = 1,
    /// Context-specific class (10)
    ContextSpecific = 2,
    /// Private class (11)
    Private = 3,
}

impl BerClass {
    /// Get tag class from the top two bits of a tag preamble byte
    pub fn from_bits(bits: u8) -> Self {
        match (bits >> 6) & 0x03 {
            0 => BerClass::Universal,
            1 => BerClass::Application,
            2 => BerClass::ContextSpecific,
            _ => BerClass::Private,
        }
    }

    /// Convert tag class to preamble bits (for encoding)
    pub fn to_bits(self) -> u8 {
        (self as u8) << 6
    }
}

/// BER Tag
///
/// Identifies a node on the wire. Consists of a class, a container flag and
/// a tag number. Tag numbers 0-30 encode in a single byte; larger numbers
/// use the extended form with base-128 continuation bytes and must
/// round-trip up to `u32::MAX`.
///
/// Equality and ordering consider only (class, number); the container flag
/// is an encoding detail applied when the tag is written.
#[derive(Debug, Clone, Copy)]
pub struct BerTag {
    class: BerClass,
    container: bool,
    number: u32,
}

impl PartialEq for BerTag {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.number == other.number
    }
}

impl Eq for BerTag {}

impl PartialOrd for BerTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BerTag {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.class, self.number).cmp(&(other.class, other.number))
    }
}

impl std::hash::Hash for BerTag {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.class.hash(state);
        self.number.hash(state);
    }
}

impl std::fmt::Display for BerTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let class = match self.class {
            BerClass::Universal => "U",
            BerClass::Application => "A",
            BerClass::ContextSpecific => "C",
            BerClass::Private => "P",
        };
        write!(f, "{}-{}", class, self.number)
    }
}

impl BerTag {
    /// Create a new primitive tag
    pub fn new(class: BerClass, number: u32) -> Self {
        Self {
            class,
            container: false,
            number,
        }
    }

    /// Create a Universal class tag
    pub fn universal(number: u32) -> Self {
        Self::new(BerClass::Universal, number)
    }

    /// Create an Application class tag
    pub fn application(number: u32) -> Self {
        Self::new(BerClass::Application, number)
    }

    /// Create a Context-specific class tag
    pub fn context(number: u32) -> Self {
        Self::new(BerClass::ContextSpecific, number)
    }

    /// Get tag class
    pub fn class(&self) -> BerClass {
        self.class
    }

    /// Get tag number
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Whether the container flag is set
    pub fn is_container(&self) -> bool {
        self.container
    }

    /// Same tag with the container flag set
    pub fn to_container(self) -> Self {
        Self {
            container: true,
            ..self
        }
    }

    /// Same tag with the container flag cleared
    pub fn to_primitive(self) -> Self {
        Self {
            container: false,
            ..self
        }
    }

    /// Encode tag, appending to `out`
    ///
    /// Tag numbers below 31 use the short form; larger numbers emit the
    /// 0x1F marker followed by base-128 continuation bytes, most
    /// significant group first.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let preamble = self.class.to_bits() | if self.container { CONTAINER_FLAG } else { 0 };

        if self.number < 31 {
            out.push(preamble | self.number as u8);
        } else {
            out.push(preamble | 0x1F);

            let mut groups = [0u8; 5];
            let mut count = 0;
            let mut remaining = self.number;
            while remaining > 0 {
                groups[count] = (remaining & 0x7F) as u8;
                remaining >>= 7;
                count += 1;
            }
            for i in (0..count).rev() {
                if i > 0 {
                    out.push(groups[i] | 0x80);
                } else {
                    out.push(groups[i]);
                }
            }
        }
    }

    /// Decode tag from bytes
    ///
    /// # Returns
    /// `Ok((tag, bytes_consumed))` on success
    pub fn decode(data: &[u8]) -> EmberResult<(Self, usize)> {
        if data.is_empty() {
            return Err(EmberError::ber(
                ber_code::UNEXPECTED_EOF,
                "empty buffer for tag",
            ));
        }

        let preamble = data[0];
        let class = BerClass::from_bits(preamble);
        let container = (preamble & CONTAINER_FLAG) != 0;
        let number_bits = preamble & 0x1F;

        if number_bits < 31 {
            return Ok((
                Self {
                    class,
                    container,
                    number: number_bits as u32,
                },
                1,
            ));
        }

        // Extended form: base-128 continuation bytes
        let mut number: u32 = 0;
        let mut pos = 1;
        loop {
            if pos >= data.len() {
                return Err(EmberError::ber(
                    ber_code::UNEXPECTED_EOF,
                    "truncated extended tag",
                ));
            }
            // 5 continuation bytes carry up to 35 bits; anything more overflows u32
            if pos > 5 {
                return Err(EmberError::ber(
                    ber_code::INVALID_TAG,
                    "tag number exceeds 32 bits",
                ));
            }
            let byte = data[pos];
            if number > u32::MAX >> 7 {
                return Err(EmberError::ber(
                    ber_code::INVALID_TAG,
                    "tag number exceeds 32 bits",
                ));
            }
            number = (number << 7) | (byte & 0x7F) as u32;
            pos += 1;
            if (byte & 0x80) == 0 {
                break;
            }
        }

        Ok((
            Self {
                class,
                container,
                number,
            },
            pos,
        ))
    }
}

/// BER Length
///
/// Definite lengths use the short form below 128 and the long form with a
/// byte-count prefix above. EmBER containers are written with the
/// indefinite form (single 0x80 octet, closed by a two-zero terminator),
/// so unlike plain DER both forms must round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BerLength {
    /// A definite content length in bytes
    Definite(usize),
    /// Indefinite form; the container is closed by a 0x00 0x00 terminator
    Indefinite,
}

impl BerLength {
    /// The definite value, if any
    pub fn definite(&self) -> Option<usize> {
        match self {
            BerLength::Definite(n) => Some(*n),
            BerLength::Indefinite => None,
        }
    }

    /// Encode length octets, appending to `out`
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            BerLength::Indefinite => out.push(0x80),
            BerLength::Definite(length) => {
                if *length < 128 {
                    out.push(*length as u8);
                } else {
                    let mut num_bytes = 0;
                    let mut temp = *length;
                    while temp > 0 {
                        num_bytes += 1;
                        temp >>= 8;
                    }
                    out.push(0x80 | num_bytes as u8);
                    for i in (0..num_bytes).rev() {
                        out.push(((*length >> (i * 8)) & 0xFF) as u8);
                    }
                }
            }
        }
    }

    /// Decode length octets from bytes
    ///
    /// # Returns
    /// `Ok((length, bytes_consumed))` on success
    pub fn decode(data: &[u8]) -> EmberResult<(Self, usize)> {
        if data.is_empty() {
            return Err(EmberError::ber(
                ber_code::UNEXPECTED_EOF,
                "empty buffer for length",
            ));
        }

        let first = data[0];
        if (first & 0x80) == 0 {
            return Ok((BerLength::Definite(first as usize), 1));
        }

        let num_bytes = (first & 0x7F) as usize;
        if num_bytes == 0 {
            return Ok((BerLength::Indefinite, 1));
        }
        if num_bytes > 4 {
            return Err(EmberError::ber(
                ber_code::INVALID_LENGTH,
                format!("length prefix of {} bytes exceeds 4-byte limit", num_bytes),
            ));
        }
        if data.len() < 1 + num_bytes {
            return Err(EmberError::ber(
                ber_code::UNEXPECTED_EOF,
                "truncated long-form length",
            ));
        }

        let mut length = 0usize;
        for &byte in &data[1..1 + num_bytes] {
            length = (length << 8) | byte as usize;
        }
        Ok((BerLength::Definite(length), 1 + num_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(tag: BerTag) -> BerTag {
        let mut buf = Vec::new();
        tag.encode(&mut buf);
        let (decoded, consumed) = BerTag::decode(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        decoded
    }

    #[test]
    fn test_tag_short_form() {
        let mut buf = Vec::new();
        BerTag::universal(2).encode(&mut buf);
        assert_eq!(buf, vec![0x02]);

        buf.clear();
        BerTag::context(3).to_container().encode(&mut buf);
        assert_eq!(buf, vec![0xA3]);
    }

    #[test]
    fn test_tag_roundtrip_all_classes() {
        for class in [
            BerClass::Universal,
            BerClass::Application,
            BerClass::ContextSpecific,
            BerClass::Private,
        ] {
            for number in [0u32, 1, 30, 31, 127, 128, 16383, 16384, 0xFFFF_FFFF] {
                let tag = BerTag::new(class, number);
                assert_eq!(roundtrip(tag), tag, "class {:?} number {}", class, number);
            }
        }
    }

    #[test]
    fn test_tag_max_number_encoding() {
        let mut buf = Vec::new();
        BerTag::application(u32::MAX).encode(&mut buf);
        // 0x5F marker + five continuation bytes for 32 bits
        assert_eq!(buf[0], 0x5F);
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn test_tag_number_past_32_bits_rejected() {
        // five continuation bytes encoding 2^32 must error, not alias to 0
        let err = BerTag::decode(&[0x9F, 0x90, 0x80, 0x80, 0x80, 0x00]).unwrap_err();
        match err {
            EmberError::Ber { code, .. } => assert_eq!(code, ber_code::INVALID_TAG),
            other => panic!("unexpected error {:?}", other),
        }

        // u32::MAX is the largest decodable number
        let (tag, consumed) = BerTag::decode(&[0x9F, 0x8F, 0xFF, 0xFF, 0xFF, 0x7F]).unwrap();
        assert_eq!(tag.number(), u32::MAX);
        assert_eq!(consumed, 6);
    }

    #[test]
    fn test_tag_equality_ignores_container_flag() {
        let a = BerTag::context(7);
        let b = BerTag::context(7).to_container();
        assert_eq!(a, b);
        assert!(b.is_container());
    }

    #[test]
    fn test_tag_ordering() {
        assert!(BerTag::universal(9) < BerTag::application(0));
        assert!(BerTag::context(1) < BerTag::context(2));
    }

    #[test]
    fn test_length_short_form() {
        let mut buf = Vec::new();
        BerLength::Definite(100).encode(&mut buf);
        assert_eq!(buf, vec![100]);
        let (len, consumed) = BerLength::decode(&buf).unwrap();
        assert_eq!(len, BerLength::Definite(100));
        assert_eq!(consumed, 1);
    }

    #[test]
    fn test_length_long_form() {
        let mut buf = Vec::new();
        BerLength::Definite(1000).encode(&mut buf);
        assert_eq!(buf, vec![0x82, 0x03, 0xE8]);
        let (len, consumed) = BerLength::decode(&buf).unwrap();
        assert_eq!(len, BerLength::Definite(1000));
        assert_eq!(consumed, 3);
    }

    #[test]
    fn test_length_indefinite() {
        let mut buf = Vec::new();
        BerLength::Indefinite.encode(&mut buf);
        assert_eq!(buf, vec![0x80]);
        let (len, _) = BerLength::decode(&buf).unwrap();
        assert_eq!(len, BerLength::Indefinite);
    }

    #[test]
    fn test_truncated_tag_fails() {
        // extended marker with continuation bit set and no trailing byte
        let err = BerTag::decode(&[0x5F, 0x81]).unwrap_err();
        assert!(matches!(err, EmberError::Ber { .. }));
    }
}
