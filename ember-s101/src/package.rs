//! S101 package header codec
//!
//! A frame's payload starts with a fixed header: slot, message id (always
//! 0x0E for Ember), command, framing version, flags, DTD id and a counted
//! run of application bytes. Keep-alive packages are a fixed 4-byte form
//! without flags or DTD.

use crate::error::{EmberError, EmberResult};

/// The only message id carried over S101 by this stack
pub const MESSAGE_EMBER: u8 = 0x0E;
/// Framing version written into every package
pub const FRAMING_VERSION: u8 = 0x01;
/// DTD id of the Glow schema
pub const DTD_GLOW: u8 = 0x01;
/// Default application bytes: Glow DTD version, minor then major
pub const GLOW_DTD_VERSION: [u8; 2] = [0x1F, 0x02];

/// Package commands
pub mod command {
    /// The package carries (part of) an Ember payload
    pub const EMBER: u8 = 0x00;
    pub const KEEPALIVE_REQUEST: u8 = 0x01;
    pub const KEEPALIVE_RESPONSE: u8 = 0x02;
}

/// Package flag bits
pub mod flags {
    /// First package of a message
    pub const FIRST: u8 = 0x80;
    /// Last package of a message
    pub const LAST: u8 = 0x40;
    /// Package carries no payload bytes
    pub const EMPTY: u8 = 0x20;
}

/// Decoded package header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageHeader {
    pub slot: u8,
    pub command: u8,
    pub version: u8,
    pub flags: u8,
    pub dtd: u8,
    pub app_bytes: Vec<u8>,
}

impl PackageHeader {
    /// Header for an Ember payload package
    pub fn ember(slot: u8, flags: u8, dtd: u8, app_bytes: Vec<u8>) -> Self {
        Self {
            slot,
            command: command::EMBER,
            version: FRAMING_VERSION,
            flags,
            dtd,
            app_bytes,
        }
    }

    pub fn is_first(&self) -> bool {
        (self.flags & flags::FIRST) != 0
    }

    pub fn is_last(&self) -> bool {
        (self.flags & flags::LAST) != 0
    }

    pub fn is_empty(&self) -> bool {
        (self.flags & flags::EMPTY) != 0
    }

    /// Encoded header size in bytes
    pub fn encoded_len(&self) -> usize {
        7 + self.app_bytes.len()
    }

    /// Append the header bytes to `out`
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.slot);
        out.push(MESSAGE_EMBER);
        out.push(self.command);
        out.push(self.version);
        out.push(self.flags);
        out.push(self.dtd);
        out.push(self.app_bytes.len() as u8);
        out.extend_from_slice(&self.app_bytes);
    }

    /// Decode a header from the start of a frame payload.
    ///
    /// # Returns
    /// The header and the offset at which the Ember payload begins.
    pub fn decode(data: &[u8]) -> EmberResult<(Self, usize)> {
        if data.len() < 4 {
            return Err(EmberError::Framing(format!(
                "package of {} bytes is shorter than the minimal header",
                data.len()
            )));
        }
        if data[1] != MESSAGE_EMBER {
            return Err(EmberError::Framing(format!(
                "unexpected message id 0x{:02X}",
                data[1]
            )));
        }

        let slot = data[0];
        let cmd = data[2];
        let version = data[3];

        // keep-alives are the fixed short form
        if cmd == command::KEEPALIVE_REQUEST || cmd == command::KEEPALIVE_RESPONSE {
            return Ok((
                Self {
                    slot,
                    command: cmd,
                    version,
                    flags: 0,
                    dtd: 0,
                    app_bytes: Vec::new(),
                },
                4,
            ));
        }

        if data.len() < 7 {
            return Err(EmberError::Framing(format!(
                "package of {} bytes is shorter than the Ember header",
                data.len()
            )));
        }
        let app_count = data[6] as usize;
        if data.len() < 7 + app_count {
            return Err(EmberError::Framing(
                "package truncated inside application bytes".to_string(),
            ));
        }

        Ok((
            Self {
                slot,
                command: cmd,
                version,
                flags: data[4],
                dtd: data[5],
                app_bytes: data[7..7 + app_count].to_vec(),
            },
            7 + app_count,
        ))
    }
}

/// The fixed 4-byte keep-alive request package
pub fn keep_alive_request(slot: u8) -> [u8; 4] {
    [slot, MESSAGE_EMBER, command::KEEPALIVE_REQUEST, FRAMING_VERSION]
}

/// The fixed 4-byte keep-alive response package
pub fn keep_alive_response(slot: u8) -> [u8; 4] {
    [slot, MESSAGE_EMBER, command::KEEPALIVE_RESPONSE, FRAMING_VERSION]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = PackageHeader::ember(
            3,
            flags::FIRST | flags::LAST,
            DTD_GLOW,
            GLOW_DTD_VERSION.to_vec(),
        );
        let mut buf = Vec::new();
        header.encode(&mut buf);
        buf.extend_from_slice(&[0x60, 0x80]); // payload

        let (decoded, offset) = PackageHeader::decode(&buf).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(offset, header.encoded_len());
        assert_eq!(&buf[offset..], &[0x60, 0x80]);
    }

    #[test]
    fn test_flag_accessors() {
        let header = PackageHeader::ember(0, flags::FIRST | flags::EMPTY, DTD_GLOW, Vec::new());
        assert!(header.is_first());
        assert!(!header.is_last());
        assert!(header.is_empty());
    }

    #[test]
    fn test_keep_alive_shapes() {
        assert_eq!(keep_alive_request(5), [5, 0x0E, 0x01, 0x01]);
        assert_eq!(keep_alive_response(5), [5, 0x0E, 0x02, 0x01]);

        let (header, offset) = PackageHeader::decode(&keep_alive_request(5)).unwrap();
        assert_eq!(header.command, command::KEEPALIVE_REQUEST);
        assert_eq!(header.slot, 5);
        assert_eq!(offset, 4);
    }

    #[test]
    fn test_rejects_foreign_message_id() {
        let err = PackageHeader::decode(&[0, 0x0F, 0, 1]).unwrap_err();
        assert!(matches!(err, EmberError::Framing(_)));
    }

    #[test]
    fn test_rejects_truncated_header() {
        assert!(PackageHeader::decode(&[0, 0x0E]).is_err());
        assert!(PackageHeader::decode(&[0, 0x0E, 0x00, 1, 0, 1, 4, 1]).is_err());
    }
}
