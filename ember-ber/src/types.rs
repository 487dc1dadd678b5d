//! Universal type numbers and leaf value types

use crate::error::{ber_code, EmberError, EmberResult};

/// Universal BER type numbers used by EmBER, plus the application flag.
///
/// A node's type is either one of these universal numbers or an
/// application-defined number with [`ber_type::APPLICATION_FLAG`] set.
pub mod ber_type {
    pub const BOOLEAN: u32 = 1;
    pub const INTEGER: u32 = 2;
    pub const BIT_STRING: u32 = 3;
    pub const OCTET_STRING: u32 = 4;
    pub const NULL: u32 = 5;
    pub const OBJECT_IDENTIFIER: u32 = 6;
    pub const REAL: u32 = 9;
    pub const UTF8_STRING: u32 = 12;
    pub const RELATIVE_OID: u32 = 13;
    pub const SEQUENCE: u32 = 16;
    pub const SET: u32 = 17;
    pub const GENERALIZED_TIME: u32 = 24;

    /// High bit marks an application-defined type number
    pub const APPLICATION_FLAG: u32 = 0x8000_0000;

    /// Build an application-defined type number
    pub const fn application(number: u32) -> u32 {
        number | APPLICATION_FLAG
    }

    /// Strip the application flag, yielding the raw tag number
    pub const fn number_of(ber_type: u32) -> u32 {
        ber_type & !APPLICATION_FLAG
    }

    /// Whether the type number is application-defined
    pub const fn is_application(ber_type: u32) -> bool {
        (ber_type & APPLICATION_FLAG) != 0
    }
}

/// A decoded UTC timestamp carried in a GENERALIZED-TIME leaf.
///
/// Only the `YYYYMMDDHHMMSSZ` and `YYYYMMDDHHMMSS.mmmZ` shapes are produced
/// and accepted; calendar validity beyond field ranges is not checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EmberTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u16,
}

impl EmberTime {
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            millisecond: 0,
        }
    }

    /// Render the ASCII content octets
    pub fn to_content(&self) -> Vec<u8> {
        let text = if self.millisecond != 0 {
            format!(
                "{:04}{:02}{:02}{:02}{:02}{:02}.{:03}Z",
                self.year, self.month, self.day, self.hour, self.minute, self.second,
                self.millisecond
            )
        } else {
            format!(
                "{:04}{:02}{:02}{:02}{:02}{:02}Z",
                self.year, self.month, self.day, self.hour, self.minute, self.second
            )
        };
        text.into_bytes()
    }

    /// Parse the ASCII content octets
    pub fn from_content(content: &[u8]) -> EmberResult<Self> {
        let text = std::str::from_utf8(content)
            .map_err(|_| EmberError::ber(ber_code::INVALID_VALUE, "generalized time not ASCII"))?;
        let text = text.strip_suffix('Z').ok_or_else(|| {
            EmberError::ber(ber_code::INVALID_VALUE, "generalized time missing Z suffix")
        })?;

        let (base, millis) = match text.split_once('.') {
            Some((base, frac)) => {
                let millis: u16 = frac.parse().map_err(|_| {
                    EmberError::ber(ber_code::INVALID_VALUE, "bad fractional seconds")
                })?;
                (base, millis)
            }
            None => (text, 0),
        };

        if base.len() != 14 || !base.bytes().all(|b| b.is_ascii_digit()) {
            return Err(EmberError::ber(
                ber_code::INVALID_VALUE,
                "generalized time must be YYYYMMDDHHMMSS",
            ));
        }

        // digits were validated above
        let field = |range: std::ops::Range<usize>| {
            base.as_bytes()[range]
                .iter()
                .fold(0u16, |acc, b| acc * 10 + (b - b'0') as u16)
        };
        let time = Self {
            year: field(0..4),
            month: field(4..6) as u8,
            day: field(6..8) as u8,
            hour: field(8..10) as u8,
            minute: field(10..12) as u8,
            second: field(12..14) as u8,
            millisecond: millis,
        };

        if time.month == 0 || time.month > 12 || time.day == 0 || time.day > 31 {
            return Err(EmberError::ber(ber_code::INVALID_VALUE, "date out of range"));
        }
        if time.hour > 23 || time.minute > 59 || time.second > 60 {
            return Err(EmberError::ber(ber_code::INVALID_VALUE, "time out of range"));
        }
        Ok(time)
    }
}

/// A leaf value in an Ember tree.
///
/// This is the closed set of value kinds EmBER carries; dispatch happens by
/// exhaustive matching, never by downcasting.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Utf8String(String),
    OctetString(Vec<u8>),
    ObjectIdentifier(Vec<u32>),
    RelativeOid(Vec<u32>),
    Time(EmberTime),
    Null,
}

impl Value {
    /// The universal type number this value encodes as
    pub fn universal_type(&self) -> u32 {
        match self {
            Value::Boolean(_) => ber_type::BOOLEAN,
            Value::Integer(_) => ber_type::INTEGER,
            Value::Real(_) => ber_type::REAL,
            Value::Utf8String(_) => ber_type::UTF8_STRING,
            Value::OctetString(_) => ber_type::OCTET_STRING,
            Value::ObjectIdentifier(_) => ber_type::OBJECT_IDENTIFIER,
            Value::RelativeOid(_) => ber_type::RELATIVE_OID,
            Value::Time(_) => ber_type::GENERALIZED_TIME,
            Value::Null => ber_type::NULL,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Utf8String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_oid(&self) -> Option<&[u32]> {
        match self {
            Value::ObjectIdentifier(v) | Value::RelativeOid(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Utf8String(v) => write!(f, "{}", v),
            Value::OctetString(v) => {
                for byte in v {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
            Value::ObjectIdentifier(v) | Value::RelativeOid(v) => {
                let parts: Vec<String> = v.iter().map(|n| n.to_string()).collect();
                write!(f, "{}", parts.join("."))
            }
            Value::Time(t) => write!(f, "{}", String::from_utf8_lossy(&t.to_content())),
            Value::Null => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_roundtrip() {
        let time = EmberTime::new(2024, 6, 15, 12, 30, 45);
        let content = time.to_content();
        assert_eq!(content, b"20240615123045Z");
        assert_eq!(EmberTime::from_content(&content).unwrap(), time);
    }

    #[test]
    fn test_time_with_millis() {
        let mut time = EmberTime::new(1999, 12, 31, 23, 59, 59);
        time.millisecond = 250;
        let content = time.to_content();
        assert_eq!(content, b"19991231235959.250Z");
        assert_eq!(EmberTime::from_content(&content).unwrap(), time);
    }

    #[test]
    fn test_time_rejects_garbage() {
        assert!(EmberTime::from_content(b"not a time").is_err());
        assert!(EmberTime::from_content(b"20240615123045").is_err());
        assert!(EmberTime::from_content(b"20241315123045Z").is_err());
    }

    #[test]
    fn test_application_type_numbers() {
        let t = ber_type::application(13);
        assert!(ber_type::is_application(t));
        assert_eq!(ber_type::number_of(t), 13);
        assert!(!ber_type::is_application(ber_type::SET));
    }
}
