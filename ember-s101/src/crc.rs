//! CRC-16/CCITT integrity check for S101 frames

use crate::error::{EmberError, EmberResult};

/// CRC calculation constants
const INITIAL_CRC: u16 = 0xFFFF;
const GOOD_CRC: u16 = 0xF0B8;
const KEY: u16 = 0x8408; // Bit-reversed 1021

/// Precomputed CRC table
static CRC_TABLE: once_cell::sync::Lazy<[u16; 256]> = once_cell::sync::Lazy::new(|| {
    let mut table = [0u16; 256];
    for b in 0..=0xFF {
        let mut v = b as u16;
        for _ in 0..8 {
            if (v & 1) == 1 {
                v = (v >> 1) ^ KEY;
            } else {
                v >>= 1;
            }
        }
        table[b as usize] = v;
    }
    table
});

/// Running frame CRC
///
/// The receiver updates this over every post-unescape payload byte
/// including the two trailing CRC bytes; a frame is accepted only when the
/// final value equals the fixed residue 0xF0B8. The transmitter appends the
/// ones' complement of the running value, low byte first.
#[derive(Debug, Clone)]
pub struct FrameCrc {
    value: u16,
}

impl FrameCrc {
    pub fn new() -> Self {
        Self { value: INITIAL_CRC }
    }

    /// Reset to the per-frame initial state
    pub fn reset(&mut self) {
        self.value = INITIAL_CRC;
    }

    /// Update with a single byte
    pub fn update(&mut self, data: u8) {
        self.value = (self.value >> 8) ^ CRC_TABLE[((self.value ^ data as u16) & 0xFF) as usize];
    }

    /// Update with multiple bytes
    pub fn update_bytes(&mut self, data: &[u8]) {
        for &byte in data {
            self.update(byte);
        }
    }

    /// The trailing CRC bytes a transmitter appends (ones' complement,
    /// little-endian)
    pub fn trailer(&self) -> [u8; 2] {
        let inverted = self.value ^ 0xFFFF;
        [(inverted & 0xFF) as u8, (inverted >> 8) as u8]
    }

    /// Validate the accumulated value against the residue
    pub fn validate(&self) -> EmberResult<()> {
        if self.value != GOOD_CRC {
            Err(EmberError::Framing(format!(
                "CRC has wrong value: 0x{:04X}, expected 0x{:04X}",
                self.value, GOOD_CRC
            )))
        } else {
            Ok(())
        }
    }

    /// Current running value
    pub fn value(&self) -> u16 {
        self.value
    }
}

impl Default for FrameCrc {
    fn default() -> Self {
        Self::new()
    }
}
