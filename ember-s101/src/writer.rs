//! Outgoing package assembly
//!
//! `PackageWriter` buffers an Ember payload and cuts it into S101 packages
//! of at most `max_package_length` bytes (header included). Every package
//! is handed back as a complete wire frame. `finish` must be called to emit
//! the terminal package before the writer is dropped or reused.

use bytes::{BufMut, BytesMut};

use crate::error::{EmberError, EmberResult};
use crate::frame;
use crate::package::{command, flags, PackageHeader, DTD_GLOW, GLOW_DTD_VERSION};

/// Smallest permitted `max_package_length`
pub const MIN_PACKAGE_LENGTH: usize = 64;
/// Largest permitted `max_package_length`
pub const MAX_PACKAGE_LENGTH: usize = 65535;

/// Static parameters of one outgoing package stream
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub slot: u8,
    pub dtd: u8,
    pub app_bytes: Vec<u8>,
    /// Upper bound on one package, header included
    pub max_package_length: usize,
    /// Emit non-escaping length-prefixed frames instead of escaping ones
    pub non_escaping: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            slot: 0,
            dtd: DTD_GLOW,
            app_bytes: GLOW_DTD_VERSION.to_vec(),
            max_package_length: 1024,
            non_escaping: false,
        }
    }
}

impl WriterConfig {
    fn header_len(&self) -> usize {
        7 + self.app_bytes.len()
    }

    fn validate(&self) -> EmberResult<()> {
        if self.max_package_length < MIN_PACKAGE_LENGTH
            || self.max_package_length > MAX_PACKAGE_LENGTH
        {
            return Err(EmberError::InvalidData(format!(
                "max package length {} outside [{}, {}]",
                self.max_package_length, MIN_PACKAGE_LENGTH, MAX_PACKAGE_LENGTH
            )));
        }
        if self.header_len() >= self.max_package_length {
            return Err(EmberError::InvalidData(format!(
                "{} application bytes leave no payload room in {}-byte packages",
                self.app_bytes.len(),
                self.max_package_length
            )));
        }
        Ok(())
    }
}

/// Buffering package writer for one logical Ember message at a time
pub struct PackageWriter {
    config: WriterConfig,
    buffer: BytesMut,
    /// Payload capacity of one package
    capacity: usize,
    package_sent: bool,
}

impl PackageWriter {
    pub fn new(config: WriterConfig) -> EmberResult<Self> {
        config.validate()?;
        let capacity = config.max_package_length - config.header_len();
        Ok(Self {
            config,
            buffer: BytesMut::new(),
            capacity,
            package_sent: false,
        })
    }

    /// Bytes buffered but not yet emitted
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Buffer payload bytes, emitting a wire frame for every package that
    /// fills up
    pub fn write(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.put_slice(data);
        let mut frames = Vec::new();
        while self.buffer.len() >= self.capacity {
            let chunk = self.buffer.split_to(self.capacity);
            frames.push(self.emit(&chunk, false));
        }
        frames
    }

    /// Emit the terminal package and reset for the next message.
    ///
    /// Called with nothing buffered and no package emitted yet, this still
    /// produces a single empty package flagged first, last and empty.
    pub fn finish(&mut self) -> Vec<u8> {
        let chunk = self.buffer.split();
        let frame = self.emit(&chunk, true);
        self.package_sent = false;
        frame
    }

    fn emit(&mut self, payload: &[u8], last: bool) -> Vec<u8> {
        let mut package_flags = 0;
        if !self.package_sent {
            package_flags |= flags::FIRST;
        }
        if last {
            package_flags |= flags::LAST;
            if payload.is_empty() {
                package_flags |= flags::EMPTY;
            }
        }
        self.package_sent = true;

        let header = PackageHeader {
            slot: self.config.slot,
            command: command::EMBER,
            version: crate::package::FRAMING_VERSION,
            flags: package_flags,
            dtd: self.config.dtd,
            app_bytes: self.config.app_bytes.clone(),
        };
        let mut package = Vec::with_capacity(header.encoded_len() + payload.len());
        header.encode(&mut package);
        package.extend_from_slice(payload);

        if self.config.non_escaping {
            frame::encode_frame_raw(&package)
        } else {
            frame::encode_frame(&package)
        }
    }
}

impl Drop for PackageWriter {
    fn drop(&mut self) {
        // finish-before-teardown is a hard contract
        if !self.buffer.is_empty() {
            let err = EmberError::IncompleteWrite(self.buffer.len());
            log::error!("package writer dropped: {}", err);
            debug_assert!(false, "PackageWriter dropped before finish()");
        }
    }
}

/// Frame a complete Ember payload as one package stream
pub fn encode_message(config: &WriterConfig, payload: &[u8]) -> EmberResult<Vec<Vec<u8>>> {
    let mut writer = PackageWriter::new(config.clone())?;
    let mut frames = writer.write(payload);
    frames.push(writer.finish());
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageHeader;

    fn small_config() -> WriterConfig {
        WriterConfig {
            max_package_length: MIN_PACKAGE_LENGTH,
            ..WriterConfig::default()
        }
    }

    fn deframe(wire: &[u8]) -> Vec<u8> {
        let mut rx = frame::FrameReceiver::new();
        for &byte in wire {
            if let Some(payload) = rx.receive(byte).unwrap() {
                return payload;
            }
        }
        panic!("incomplete frame");
    }

    #[test]
    fn test_single_package_message() {
        let mut writer = PackageWriter::new(WriterConfig::default()).unwrap();
        assert!(writer.write(&[1, 2, 3]).is_empty());
        let frame = writer.finish();

        let package = deframe(&frame);
        let (header, offset) = PackageHeader::decode(&package).unwrap();
        assert!(header.is_first() && header.is_last() && !header.is_empty());
        assert_eq!(&package[offset..], &[1, 2, 3]);
    }

    #[test]
    fn test_fragmentation_flags() {
        let config = small_config();
        let capacity = config.max_package_length - config.app_bytes.len() - 7;
        let payload = vec![0xAB; capacity * 2 + 5];

        let frames = encode_message(&config, &payload).unwrap();
        assert_eq!(frames.len(), 3);

        let headers: Vec<PackageHeader> = frames
            .iter()
            .map(|f| PackageHeader::decode(&deframe(f)).unwrap().0)
            .collect();
        assert!(headers[0].is_first() && !headers[0].is_last());
        assert!(!headers[1].is_first() && !headers[1].is_last());
        assert!(!headers[2].is_first() && headers[2].is_last());
    }

    #[test]
    fn test_empty_message_is_first_last_empty() {
        let mut writer = PackageWriter::new(WriterConfig::default()).unwrap();
        let frame = writer.finish();
        let (header, offset) = PackageHeader::decode(&deframe(&frame)).unwrap();
        assert!(header.is_first() && header.is_last() && header.is_empty());
        assert_eq!(offset, deframe(&frame).len());
    }

    #[test]
    fn test_exactly_full_buffer_gets_empty_terminal_package() {
        let config = small_config();
        let capacity = config.max_package_length - config.app_bytes.len() - 7;
        let mut writer = PackageWriter::new(config).unwrap();

        let frames = writer.write(&vec![0x11; capacity]);
        assert_eq!(frames.len(), 1);
        let terminal = writer.finish();
        let (header, _) = PackageHeader::decode(&deframe(&terminal)).unwrap();
        assert!(header.is_last() && header.is_empty());
    }

    #[test]
    fn test_config_bounds_checked() {
        let too_small = WriterConfig {
            max_package_length: MIN_PACKAGE_LENGTH - 1,
            ..WriterConfig::default()
        };
        assert!(PackageWriter::new(too_small).is_err());

        let too_large = WriterConfig {
            max_package_length: MAX_PACKAGE_LENGTH + 1,
            ..WriterConfig::default()
        };
        assert!(PackageWriter::new(too_large).is_err());
    }

    #[test]
    #[should_panic(expected = "dropped before finish")]
    fn test_drop_with_buffered_data_panics_in_debug() {
        let mut writer = PackageWriter::new(WriterConfig::default()).unwrap();
        writer.write(&[1, 2, 3]);
        drop(writer);
    }

    #[test]
    fn test_incomplete_write_error_reports_pending_bytes() {
        let err = EmberError::IncompleteWrite(3);
        assert_eq!(
            err.to_string(),
            "Incomplete write: 3 buffered bytes discarded before finish"
        );
    }

    #[test]
    fn test_writer_reusable_after_finish() {
        let mut writer = PackageWriter::new(WriterConfig::default()).unwrap();
        writer.write(&[1]);
        let first = writer.finish();
        writer.write(&[2]);
        let second = writer.finish();

        let (h1, _) = PackageHeader::decode(&deframe(&first)).unwrap();
        let (h2, _) = PackageHeader::decode(&deframe(&second)).unwrap();
        assert!(h1.is_first() && h1.is_last());
        assert!(h2.is_first() && h2.is_last());
    }
}
