//! Diag Client (§4.6) — version/NV/AT/reset/power-off/switch-to-download
//! commands over a flag-delimited frame with its own CRC variant.

pub mod bcd;
pub mod crc16_diag;

use std::time::{Duration, Instant};

use crate::error::{FramingError, SessionError, TransportError};
use crate::hdlc::{escape, unescape};
use crate::transport::Transport;

const FLAG: u8 = 0x7E;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Command bytes. BSL has an explicit wire catalog (§6), but Diag is only
/// pinned down for NV payload shape and the switch-to-download literal —
/// these follow the conventional Qualcomm Diag command numbering used by
/// the rest of this family.
pub mod cmd {
    pub const VERSION: u8 = 0x00;
    pub const RESET: u8 = 0x06;
    pub const READ_NV: u8 = 0x11;
    pub const WRITE_NV: u8 = 0x12;
    pub const AT_CMD: u8 = 0x29;
    pub const POWER_OFF: u8 = 0x30;
}

/// NV item IDs referenced by §8 S6.
pub const NV_IMEI1: u16 = 0x0005;

/// Literal frame that triggers a USB re-enumeration into download mode
/// (§4.6). Sent byte-for-byte; no response is awaited.
pub const SWITCH_TO_DOWNLOAD_SEQUENCE: [u8; 10] =
    [0x7E, 0x00, 0x00, 0x00, 0x00, 0x08, 0x00, 0xFE, 0x81, 0x7E];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagFrame {
    pub command: u8,
    pub payload: Vec<u8>,
}

fn build_frame(command: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(1 + payload.len());
    body.push(command);
    body.extend_from_slice(payload);
    let crc = crc16_diag::crc16(&body);
    body.extend_from_slice(&crc.to_le_bytes());

    let mut out = Vec::with_capacity(body.len() + 2);
    out.push(FLAG);
    out.extend(escape(&body));
    out.push(FLAG);
    out
}

fn scan_frame(stream: &[u8]) -> Result<(DiagFrame, usize), FramingError> {
    let start = stream.iter().position(|&b| b == FLAG).ok_or(FramingError::InvalidDelimiter)?;
    let after_start = &stream[start + 1..];
    let end_rel = after_start
        .iter()
        .position(|&b| b == FLAG)
        .ok_or(FramingError::FrameIncomplete)?;
    let raw_body = &after_start[..end_rel];
    let consumed = start + 1 + end_rel + 1;

    let body = unescape(raw_body)?;
    if body.len() < 3 {
        return Err(FramingError::FrameTooShort);
    }
    let (data, crc_bytes) = body.split_at(body.len() - 2);
    let received = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
    if !crc16_diag::validate(data, received) {
        return Err(FramingError::ChecksumMismatch);
    }

    Ok((
        DiagFrame {
            command: data[0],
            payload: data[1..].to_vec(),
        },
        consumed,
    ))
}

/// Drives one Diag conversation over a transport. `connected` tracks
/// whether a reset, power-off, or switch-to-download has already torn the
/// link down (§4.6: switch-to-download resets connection state).
pub struct DiagClient<T: Transport> {
    transport: T,
    connected: bool,
    rx_scratch: Vec<u8>,
}

impl<T: Transport> DiagClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            connected: true,
            rx_scratch: Vec::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn require_connected(&self) -> Result<(), SessionError> {
        if self.connected {
            Ok(())
        } else {
            Err(SessionError::IncompatibleState)
        }
    }

    fn expect_echo(&self, frame: &DiagFrame, expected: u8) -> Result<(), SessionError> {
        if frame.command == expected {
            Ok(())
        } else {
            Err(SessionError::UnexpectedResponse(frame.command))
        }
    }

    async fn exchange(&mut self, command: u8, payload: &[u8], timeout: Duration) -> Result<DiagFrame, SessionError> {
        let wire = build_frame(command, payload);
        self.transport.tx_blocking(&wire).await?;

        let deadline = Instant::now() + timeout;
        loop {
            match scan_frame(&self.rx_scratch) {
                Ok((frame, consumed)) => {
                    self.rx_scratch.drain(..consumed);
                    return Ok(frame);
                }
                Err(FramingError::InvalidDelimiter) | Err(FramingError::FrameIncomplete) => {}
                Err(e) => return Err(e.into()),
            }
            if Instant::now() >= deadline {
                return Err(TransportError::Timeout.into());
            }
            let mut buf = [0u8; 256];
            let n = self.transport.rx_blocking(&mut buf, buf.len()).await?;
            if n > 0 {
                self.rx_scratch.extend_from_slice(&buf[..n]);
            }
        }
    }

    /// Version query — the response echoes the command byte on success.
    pub async fn query_version(&mut self) -> Result<Vec<u8>, SessionError> {
        self.require_connected()?;
        let frame = self.exchange(cmd::VERSION, &[], DEFAULT_TIMEOUT).await?;
        self.expect_echo(&frame, cmd::VERSION)?;
        Ok(frame.payload)
    }

    /// NV read: payload prefix is the 2-byte LE NV-ID, plus a 2-byte LE
    /// length (§4.6).
    pub async fn read_nv(&mut self, nv_id: u16, len: u16) -> Result<Vec<u8>, SessionError> {
        self.require_connected()?;
        let mut payload = Vec::with_capacity(4);
        payload.extend_from_slice(&nv_id.to_le_bytes());
        payload.extend_from_slice(&len.to_le_bytes());
        let frame = self.exchange(cmd::READ_NV, &payload, DEFAULT_TIMEOUT).await?;
        self.expect_echo(&frame, cmd::READ_NV)?;
        Ok(frame.payload.get(2..).unwrap_or(&[]).to_vec())
    }

    /// NV write: payload prefix is the 2-byte LE NV-ID, followed by the
    /// item bytes (§4.6).
    pub async fn write_nv(&mut self, nv_id: u16, data: &[u8]) -> Result<(), SessionError> {
        self.require_connected()?;
        let mut payload = Vec::with_capacity(2 + data.len());
        payload.extend_from_slice(&nv_id.to_le_bytes());
        payload.extend_from_slice(data);
        let frame = self.exchange(cmd::WRITE_NV, &payload, DEFAULT_TIMEOUT).await?;
        self.expect_echo(&frame, cmd::WRITE_NV)?;
        Ok(())
    }

    /// Convenience wrapper over [`write_nv`](Self::write_nv) for the IMEI
    /// BCD layout (§8 S6). Malformed input surfaces as `VerifyError`, there
    /// being no dedicated codec-error variant in `SessionError`.
    pub async fn write_imei(&mut self, nv_id: u16, imei: &str) -> Result<(), SessionError> {
        let encoded = bcd::encode_imei(imei).map_err(|_| SessionError::VerifyError)?;
        self.write_nv(nv_id, &encoded).await
    }

    /// Convenience wrapper over [`read_nv`](Self::read_nv) for the IMEI BCD
    /// layout (§8 S6).
    pub async fn read_imei(&mut self, nv_id: u16) -> Result<String, SessionError> {
        let raw = self.read_nv(nv_id, 8).await?;
        let bcd: [u8; 8] = raw.try_into().map_err(|_| SessionError::VerifyError)?;
        bcd::decode_imei(&bcd).map_err(|_| SessionError::VerifyError)
    }

    /// AT command passthrough.
    pub async fn send_at(&mut self, at_command: &str) -> Result<String, SessionError> {
        self.require_connected()?;
        let frame = self
            .exchange(cmd::AT_CMD, at_command.as_bytes(), Duration::from_secs(5))
            .await?;
        self.expect_echo(&frame, cmd::AT_CMD)?;
        Ok(String::from_utf8_lossy(&frame.payload).into_owned())
    }

    pub async fn reset(&mut self) -> Result<(), SessionError> {
        self.require_connected()?;
        let frame = self.exchange(cmd::RESET, &[], DEFAULT_TIMEOUT).await?;
        self.expect_echo(&frame, cmd::RESET)?;
        self.connected = false;
        Ok(())
    }

    pub async fn power_off(&mut self) -> Result<(), SessionError> {
        self.require_connected()?;
        let frame = self.exchange(cmd::POWER_OFF, &[], DEFAULT_TIMEOUT).await?;
        self.expect_echo(&frame, cmd::POWER_OFF)?;
        self.connected = false;
        Ok(())
    }

    /// Switch-to-download (§4.6): the device disappears mid-transaction, so
    /// no response is awaited; the session is simply marked disconnected.
    pub async fn switch_to_download(&mut self) -> Result<(), SessionError> {
        self.require_connected()?;
        self.transport.tx_blocking(&SWITCH_TO_DOWNLOAD_SEQUENCE).await?;
        self.connected = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::sim::ScriptedTransport;

    #[test]
    fn build_then_scan_round_trips() {
        let wire = build_frame(cmd::VERSION, b"payload");
        assert_eq!(wire[0], FLAG);
        assert_eq!(*wire.last().unwrap(), FLAG);
        let (frame, consumed) = scan_frame(&wire).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(frame.command, cmd::VERSION);
        assert_eq!(frame.payload, b"payload");
    }

    #[tokio::test]
    async fn s6_imei_write_then_read_round_trips() {
        let write_ack = build_frame(cmd::WRITE_NV, &NV_IMEI1.to_le_bytes());
        let mut read_payload = NV_IMEI1.to_le_bytes().to_vec();
        read_payload.extend_from_slice(&bcd::encode_imei("123456789012345").unwrap());
        let read_ack = build_frame(cmd::READ_NV, &read_payload);

        let transport = ScriptedTransport::replies(vec![write_ack, read_ack]);
        let mut client = DiagClient::new(transport);

        client.write_imei(NV_IMEI1, "123456789012345").await.unwrap();

        let sent = &client.transport.sent[0];
        assert_eq!(sent[1], cmd::WRITE_NV);
        let payload_start = 2;
        assert_eq!(&sent[payload_start..payload_start + 2], &[0x05, 0x00]);
        assert_eq!(
            &sent[payload_start + 2..payload_start + 10],
            &[0x1A, 0x32, 0x54, 0x76, 0x98, 0x10, 0x32, 0x54]
        );

        let imei = client.read_imei(NV_IMEI1).await.unwrap();
        assert_eq!(imei, "123456789012345");
    }

    #[tokio::test]
    async fn switch_to_download_emits_the_literal_sequence_and_disconnects() {
        let transport = ScriptedTransport::replies(vec![]);
        let mut client = DiagClient::new(transport);
        client.switch_to_download().await.unwrap();
        assert_eq!(client.transport.sent[0], SWITCH_TO_DOWNLOAD_SEQUENCE);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn operations_after_disconnect_are_rejected() {
        let transport = ScriptedTransport::replies(vec![]);
        let mut client = DiagClient::new(transport);
        client.switch_to_download().await.unwrap();
        assert!(matches!(
            client.query_version().await,
            Err(SessionError::IncompatibleState)
        ));
    }
}
