//! S101 frame encoding and the receive state machine
//!
//! Two framings share the wire and are auto-detected per frame by the
//! leading control byte: the escaping variant (BOF 0xFE, byte-stuffing and
//! a trailing CRC, EOF 0xFF) and the non-escaping variant (0xF8 followed by
//! a 4-byte big-endian length and the raw payload, no CRC). The two are
//! never mixed within one frame.

use crate::crc::FrameCrc;
use crate::error::{EmberError, EmberResult};

/// Begin-of-frame for the escaping variant
pub const BOF: u8 = 0xFE;
/// End-of-frame for the escaping variant
pub const EOF: u8 = 0xFF;
/// Character escape: the following byte is XORed with 0x20
pub const CE: u8 = 0xFD;
/// Opens a non-escaping length-prefixed frame
pub const BOF_NON_ESCAPING: u8 = 0xF8;

const ESCAPE_XOR: u8 = 0x20;
/// Every payload byte at or above this value must be escaped on the wire
const ESCAPE_THRESHOLD: u8 = 0xF8;
/// Payload plus two CRC bytes
const MIN_FRAME_BYTES: usize = 3;
const MAX_PAYLOAD_LENGTH: usize = 16 * 1024 * 1024;

/// Classified framing failures, used to coalesce repeated log output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingErrorKind {
    BofInFrame,
    InvalidControlByte,
    EscapedControlByte,
    ShortFrame,
    CrcMismatch,
    OversizedFrame,
}

impl std::fmt::Display for FramingErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            FramingErrorKind::BofInFrame => "BOF inside a frame",
            FramingErrorKind::InvalidControlByte => "invalid control byte inside a frame",
            FramingErrorKind::EscapedControlByte => "control byte in escaped position",
            FramingErrorKind::ShortFrame => "frame shorter than payload plus CRC",
            FramingErrorKind::CrcMismatch => "CRC mismatch",
            FramingErrorKind::OversizedFrame => "frame exceeds maximum payload length",
        };
        write!(f, "{}", text)
    }
}

/// Frame receiver statistics
#[derive(Debug, Clone, Default)]
pub struct FramingStats {
    /// Frames accepted and delivered
    pub frames_received: u64,
    /// Frames discarded due to framing or CRC errors
    pub frames_rejected: u64,
    /// Subset of rejections caused by a CRC mismatch
    pub crc_errors: u64,
    /// Bytes received while not inside any frame
    pub out_of_frame_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RxState {
    OutOfFrame,
    InFrame,
    LengthPrefix,
    RawPayload,
}

/// S101 receive state machine
///
/// Fed one byte at a time; yields the de-escaped, CRC-verified payload of
/// each complete frame. Framing errors discard the current frame only; the
/// receiver resynchronizes on the next BOF. Runs of the same error kind are
/// logged once to avoid flooding.
pub struct FrameReceiver {
    state: RxState,
    escape_armed: bool,
    crc: FrameCrc,
    payload: Vec<u8>,
    length_bytes: [u8; 4],
    length_pos: usize,
    expected_length: usize,
    pending_out_of_frame: u64,
    error_run: Option<FramingErrorKind>,
    stats: FramingStats,
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReceiver {
    pub fn new() -> Self {
        Self {
            state: RxState::OutOfFrame,
            escape_armed: false,
            crc: FrameCrc::new(),
            payload: Vec::new(),
            length_bytes: [0; 4],
            length_pos: 0,
            expected_length: 0,
            pending_out_of_frame: 0,
            error_run: None,
            stats: FramingStats::default(),
        }
    }

    pub fn stats(&self) -> &FramingStats {
        &self.stats
    }

    /// Consume one wire byte.
    ///
    /// # Returns
    /// `Ok(Some(payload))` when this byte completed a valid frame. Errors
    /// discard the frame in progress; the receiver remains usable.
    pub fn receive(&mut self, byte: u8) -> EmberResult<Option<Vec<u8>>> {
        match self.state {
            RxState::OutOfFrame => {
                match byte {
                    BOF => {
                        self.note_frame_start();
                        self.begin_escaping_frame();
                    }
                    BOF_NON_ESCAPING => {
                        self.note_frame_start();
                        self.payload.clear();
                        self.length_pos = 0;
                        self.state = RxState::LengthPrefix;
                    }
                    _ => {
                        self.pending_out_of_frame += 1;
                        self.stats.out_of_frame_bytes += 1;
                    }
                }
                Ok(None)
            }
            RxState::InFrame => self.receive_in_frame(byte),
            RxState::LengthPrefix => {
                self.length_bytes[self.length_pos] = byte;
                self.length_pos += 1;
                if self.length_pos < 4 {
                    return Ok(None);
                }
                let length = u32::from_be_bytes(self.length_bytes) as usize;
                if length > MAX_PAYLOAD_LENGTH {
                    self.state = RxState::OutOfFrame;
                    return Err(self.reject(FramingErrorKind::OversizedFrame));
                }
                if length == 0 {
                    self.state = RxState::OutOfFrame;
                    return Ok(Some(self.accept(Vec::new())));
                }
                self.expected_length = length;
                self.state = RxState::RawPayload;
                Ok(None)
            }
            RxState::RawPayload => {
                self.payload.push(byte);
                if self.payload.len() == self.expected_length {
                    self.state = RxState::OutOfFrame;
                    let payload = std::mem::take(&mut self.payload);
                    return Ok(Some(self.accept(payload)));
                }
                Ok(None)
            }
        }
    }

    fn receive_in_frame(&mut self, byte: u8) -> EmberResult<Option<Vec<u8>>> {
        if self.escape_armed {
            self.escape_armed = false;
            if byte >= ESCAPE_THRESHOLD {
                self.state = RxState::OutOfFrame;
                return Err(self.reject(FramingErrorKind::EscapedControlByte));
            }
            // undo the transmitter's stuffing
            return self.push_payload(byte ^ ESCAPE_XOR);
        }

        match byte {
            CE => {
                self.escape_armed = true;
                Ok(None)
            }
            BOF => {
                // the frame in progress is lost; the new BOF starts over
                let err = self.reject(FramingErrorKind::BofInFrame);
                self.begin_escaping_frame();
                Err(err)
            }
            EOF => {
                self.state = RxState::OutOfFrame;
                if self.payload.len() < MIN_FRAME_BYTES {
                    return Err(self.reject(FramingErrorKind::ShortFrame));
                }
                if self.crc.validate().is_err() {
                    self.payload.clear();
                    return Err(self.reject(FramingErrorKind::CrcMismatch));
                }
                let mut payload = std::mem::take(&mut self.payload);
                payload.truncate(payload.len() - 2); // strip CRC bytes
                Ok(Some(self.accept(payload)))
            }
            b if b >= ESCAPE_THRESHOLD => {
                self.state = RxState::OutOfFrame;
                self.payload.clear();
                Err(self.reject(FramingErrorKind::InvalidControlByte))
            }
            b => self.push_payload(b),
        }
    }

    fn push_payload(&mut self, byte: u8) -> EmberResult<Option<Vec<u8>>> {
        if self.payload.len() >= MAX_PAYLOAD_LENGTH {
            self.state = RxState::OutOfFrame;
            self.payload.clear();
            return Err(self.reject(FramingErrorKind::OversizedFrame));
        }
        self.crc.update(byte);
        self.payload.push(byte);
        Ok(None)
    }

    fn begin_escaping_frame(&mut self) {
        self.payload.clear();
        self.crc.reset();
        self.escape_armed = false;
        self.state = RxState::InFrame;
    }

    fn note_frame_start(&mut self) {
        if self.pending_out_of_frame > 0 {
            log::debug!(
                "discarded {} bytes outside of frame",
                self.pending_out_of_frame
            );
            self.pending_out_of_frame = 0;
        }
    }

    fn accept(&mut self, payload: Vec<u8>) -> Vec<u8> {
        self.stats.frames_received += 1;
        self.error_run = None;
        payload
    }

    /// Record a rejected frame; only the first of a run of identical error
    /// kinds is logged at warn level
    fn reject(&mut self, kind: FramingErrorKind) -> EmberError {
        self.stats.frames_rejected += 1;
        if kind == FramingErrorKind::CrcMismatch {
            self.stats.crc_errors += 1;
        }
        if self.error_run == Some(kind) {
            log::debug!("framing error (repeated): {}", kind);
        } else {
            log::warn!("framing error: {}", kind);
            self.error_run = Some(kind);
        }
        EmberError::Framing(kind.to_string())
    }
}

/// Encode a payload as an escaping frame: BOF, stuffed payload, stuffed
/// ones'-complement CRC (low byte first), EOF
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.push(BOF);
    let mut crc = FrameCrc::new();
    for &byte in payload {
        crc.update(byte);
        escape_into(&mut out, byte);
    }
    for byte in crc.trailer() {
        escape_into(&mut out, byte);
    }
    out.push(EOF);
    out
}

/// Encode a payload as a non-escaping length-prefixed frame
pub fn encode_frame_raw(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 5);
    out.push(BOF_NON_ESCAPING);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn escape_into(out: &mut Vec<u8>, byte: u8) {
    if byte >= ESCAPE_THRESHOLD {
        out.push(CE);
        out.push(byte ^ ESCAPE_XOR);
    } else {
        out.push(byte);
    }
}
