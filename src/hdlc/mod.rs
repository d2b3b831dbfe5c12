//! HDLC Framer (§4.4) — 0x7E-delimited, byte-stuffed frames with four
//! independently toggleable mode bits, shared by the BSL session (§4.5) and
//! the Diag client's framing variant (§4.6).

pub mod checksum;

use log::debug;

use crate::error::FramingError;
use checksum::ChecksumAlgorithm;

const FLAG: u8 = 0x7E;
const ESCAPE: u8 = 0x7D;
const ESCAPE_XOR: u8 = 0x20;

/// A decoded HDLC frame. Endianness and checksum algorithm are ambient
/// framer state, not stored on the frame (§3) — the BROM/FDL mode must
/// match the framer's current settings at all times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdlcFrame {
    pub type_: u16,
    pub payload: Vec<u8>,
    pub checksum: u16,
}

/// Escapes `0x7E` and `0x7D` in `data` as `{0x7D, byte ^ 0x20}` (§3, §4.4).
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        if b == FLAG || b == ESCAPE {
            out.push(ESCAPE);
            out.push(b ^ ESCAPE_XOR);
        } else {
            out.push(b);
        }
    }
    out
}

/// Inverse of [`escape`]. Fails with [`FramingError::FrameIncomplete`] if an
/// escape byte is the last byte of the input.
pub fn unescape(data: &[u8]) -> Result<Vec<u8>, FramingError> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == ESCAPE {
            i += 1;
            let escaped = *data.get(i).ok_or(FramingError::FrameIncomplete)?;
            out.push(escaped ^ ESCAPE_XOR);
        } else {
            out.push(data[i]);
        }
        i += 1;
    }
    Ok(out)
}

/// Four orthogonal, runtime-toggleable mode bits (§4.4). BROM defaults to
/// `{big_endian: true, crc16_mode: true, transcode: true, raw_mode: false}`;
/// the bootloader session flips these at the documented protocol
/// transitions rather than this type choosing defaults per phase.
#[derive(Debug, Clone, Copy)]
pub struct HdlcFramer {
    pub big_endian: bool,
    pub crc16_mode: bool,
    pub transcode: bool,
    pub raw_mode: bool,
}

impl Default for HdlcFramer {
    fn default() -> Self {
        Self {
            big_endian: true,
            crc16_mode: true,
            transcode: true,
            raw_mode: false,
        }
    }
}

impl HdlcFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        if self.crc16_mode {
            ChecksumAlgorithm::Crc16
        } else {
            ChecksumAlgorithm::Additive
        }
    }

    fn write_u16(&self, out: &mut Vec<u8>, value: u16) {
        if self.big_endian {
            out.extend_from_slice(&value.to_be_bytes());
        } else {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }

    fn read_u16(&self, bytes: &[u8]) -> u16 {
        let pair = [bytes[0], bytes[1]];
        if self.big_endian {
            u16::from_be_bytes(pair)
        } else {
            u16::from_le_bytes(pair)
        }
    }

    /// Builds a flag-delimited frame for `type_`/`payload` under the
    /// framer's current mode. In `raw_mode`, this is the identity on
    /// `payload` (§4.4) — used once the peer has been told to expect bulk
    /// untransformed partition data.
    pub fn build_frame(&self, type_: u16, payload: &[u8]) -> Vec<u8> {
        if self.raw_mode {
            return payload.to_vec();
        }

        let mut body = Vec::with_capacity(6 + payload.len());
        self.write_u16(&mut body, type_);
        self.write_u16(&mut body, payload.len() as u16);
        body.extend_from_slice(payload);
        let chk = checksum::checksum(&body, self.algorithm());
        self.write_u16(&mut body, chk);

        let mut out = Vec::with_capacity(body.len() + 2);
        out.push(FLAG);
        if self.transcode {
            out.extend(escape(&body));
        } else {
            out.extend_from_slice(&body);
        }
        out.push(FLAG);
        out
    }

    /// Scans `stream` for one complete flag-delimited frame, returning the
    /// decoded frame and the number of bytes consumed from the front of
    /// `stream`. Implements the receiver auto-switch rule: a checksum
    /// mismatch under the current algorithm is retried under the other one
    /// before being reported as an error, and a successful switch updates
    /// `self.crc16_mode` (§4.4).
    pub fn scan_frame(&mut self, stream: &[u8]) -> Result<(HdlcFrame, usize), FramingError> {
        let start = stream
            .iter()
            .position(|&b| b == FLAG)
            .ok_or(FramingError::InvalidDelimiter)?;
        let after_start = &stream[start + 1..];
        let end_rel = after_start
            .iter()
            .position(|&b| b == FLAG)
            .ok_or(FramingError::FrameIncomplete)?;
        let raw_body = &after_start[..end_rel];
        let consumed = start + 1 + end_rel + 1;

        let body = if self.transcode {
            unescape(raw_body)?
        } else {
            raw_body.to_vec()
        };

        if body.len() < 6 {
            return Err(FramingError::FrameTooShort);
        }
        let type_ = self.read_u16(&body[0..2]);
        let length = self.read_u16(&body[2..4]) as usize;
        if body.len() != 4 + length + 2 {
            return Err(FramingError::PayloadMismatch);
        }
        let header_and_payload = &body[..4 + length];
        let received = self.read_u16(&body[4 + length..4 + length + 2]);

        match checksum::auto_switch(header_and_payload, received, self.algorithm()) {
            Some(adopted) => {
                if adopted != self.algorithm() {
                    debug!("HDLC receiver auto-switched checksum algorithm to {adopted:?}");
                    self.crc16_mode = adopted == ChecksumAlgorithm::Crc16;
                }
            }
            None => return Err(FramingError::ChecksumMismatch),
        }

        Ok((
            HdlcFrame {
                type_,
                payload: header_and_payload[4..].to_vec(),
                checksum: received,
            },
            consumed,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_unescape_is_involutive() {
        for input in [
            &b""[..],
            &b"no special bytes"[..],
            &[0x7E, 0x7D, 0x01, 0x7E][..],
            &[0x7D; 10][..],
        ] {
            let escaped = escape(input);
            assert!(!escaped.iter().any(|&b| b == FLAG));
            assert_eq!(unescape(&escaped).unwrap(), input);
        }
    }

    #[test]
    fn build_then_scan_round_trips() {
        let framer = HdlcFramer::new();
        let wire = framer.build_frame(0x0001, b"hello bootloader");
        assert_eq!(wire[0], FLAG);
        assert_eq!(*wire.last().unwrap(), FLAG);

        let mut scanner = HdlcFramer::new();
        let (frame, consumed) = scanner.scan_frame(&wire).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(frame.type_, 0x0001);
        assert_eq!(frame.payload, b"hello bootloader");
    }

    #[test]
    fn raw_mode_build_frame_is_identity() {
        let mut framer = HdlcFramer::new();
        framer.raw_mode = true;
        assert_eq!(framer.build_frame(0x02, b"raw bytes"), b"raw bytes");
    }

    #[test]
    fn receiver_auto_switches_algorithm_on_mismatch() {
        let mut sender = HdlcFramer::new();
        sender.crc16_mode = false; // additive

        let wire = sender.build_frame(0x03, b"switched mode payload");

        let mut receiver = HdlcFramer::new();
        assert!(receiver.crc16_mode);
        let (frame, _) = receiver.scan_frame(&wire).unwrap();
        assert_eq!(frame.payload, b"switched mode payload");
        assert!(!receiver.crc16_mode, "receiver should have adopted additive mode");
    }

    #[test]
    fn little_endian_mode_round_trips() {
        let mut framer = HdlcFramer::new();
        framer.big_endian = false;
        let wire = framer.build_frame(0xABCD, b"le header words");
        let (frame, _) = framer.scan_frame(&wire).unwrap();
        assert_eq!(frame.type_, 0xABCD);
    }
}
