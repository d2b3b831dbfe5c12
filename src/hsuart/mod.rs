//! HSUART Framer (§4.2) — COBS-stuffed, CRC16-checked, ACK/NAK-reliable
//! packet delivery with READY_TO_READ flow control, layered over a raw
//! [`Transport`](crate::transport::Transport).

pub mod cobs;
pub mod crc16;

use log::{debug, trace, warn};
use thiserror::Error;

use crate::error::{FramingError, ProtocolError, TransportError};
use crate::mem::BoundedBuffer;
use crate::transport::Transport;

/// Maximum payload carried by a single data fragment (§4.2, §6).
pub const MAX_FRAGMENT_PAYLOAD: usize = 4000;

/// Capacity of the ring that buffers non-READY_TO_READ packets observed
/// while waiting for flow control to open (§4.2, §3).
pub const READY_TO_READ_RING_CAP: usize = 1024 * 1024;

/// The fixed protocol version this framer speaks and requires of its peer.
pub const PROTOCOL_VERSION: (u8, u8) = (1, 0);

/// Bounded retransmission budget for a single packet.
pub const DEFAULT_RETRY_BUDGET: usize = 5;

#[derive(Error, Debug)]
pub enum HsuartError {
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("peer NAK'd or stayed silent past the retry budget")]
    RetryBudgetExhausted,
}

/// The six packet kinds the HSUART wire carries (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketId {
    Protocol = 0xF0,
    EndOfTransfer = 0x55,
    Ack = 0x06,
    Nak = 0x09,
    Version = 0xAA,
    ReadyToRead = 0x0F,
}

impl PacketId {
    fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            0xF0 => Ok(Self::Protocol),
            0x55 => Ok(Self::EndOfTransfer),
            0x06 => Ok(Self::Ack),
            0x09 => Ok(Self::Nak),
            0xAA => Ok(Self::Version),
            0x0F => Ok(Self::ReadyToRead),
            other => Err(ProtocolError::InvalidPacketId(other)),
        }
    }

    fn carries_crc(self) -> bool {
        !matches!(self, Self::Ack | Self::Nak)
    }
}

/// A single decoded HSUART packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HsuartPacket {
    pub id: PacketId,
    pub version: Option<(u8, u8)>,
    pub payload: Option<Vec<u8>>,
}

impl HsuartPacket {
    pub fn ack() -> Self {
        Self {
            id: PacketId::Ack,
            version: None,
            payload: None,
        }
    }

    pub fn nak() -> Self {
        Self {
            id: PacketId::Nak,
            version: None,
            payload: None,
        }
    }

    pub fn ready_to_read() -> Self {
        Self {
            id: PacketId::ReadyToRead,
            version: None,
            payload: None,
        }
    }

    pub fn version() -> Self {
        Self {
            id: PacketId::Version,
            version: Some(PROTOCOL_VERSION),
            payload: None,
        }
    }

    pub fn data(id: PacketId, payload: Vec<u8>) -> Self {
        Self {
            id,
            version: None,
            payload: Some(payload),
        }
    }

    /// Encodes this packet to on-wire bytes, including the trailing 0x00
    /// terminator.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = vec![self.id as u8];
        if let Some((major, minor)) = self.version {
            body.push(major);
            body.push(minor);
        }
        if let Some(payload) = &self.payload {
            body.extend_from_slice(payload);
        }

        let mut wire = if self.id.carries_crc() {
            let crc = crc16::crc16(&body);
            body.extend_from_slice(&crc.to_be_bytes());
            cobs::stuff(&body)
        } else {
            // ACK/NAK ship the single id byte raw — no CRC, no stuffing.
            body
        };
        wire.push(0x00);
        wire
    }

    /// Decodes one frame's worth of bytes (with the terminator already
    /// stripped off by the caller).
    pub fn decode(frame: &[u8]) -> Result<Self, HsuartError> {
        if frame.len() == 1 && matches!(frame[0], 0x06 | 0x09) {
            let id = PacketId::from_byte(frame[0])?;
            return Ok(Self {
                id,
                version: None,
                payload: None,
            });
        }

        let unstuffed = cobs::unstuff(frame)?;
        if unstuffed.is_empty() {
            return Err(FramingError::FrameTooShort.into());
        }

        let id = PacketId::from_byte(unstuffed[0])?;
        if !id.carries_crc() {
            // An ACK/NAK byte that ended up COBS-stuffed on its own is a
            // redundant-but-valid encoding; accept it.
            return Ok(Self {
                id,
                version: None,
                payload: None,
            });
        }

        if unstuffed.len() < 3 {
            return Err(FramingError::FrameTooShort.into());
        }
        let (body, crc_bytes) = unstuffed.split_at(unstuffed.len() - 2);
        let received_crc = u16::from_be_bytes([crc_bytes[0], crc_bytes[1]]);
        if !crc16::validate(body, received_crc) {
            return Err(FramingError::ChecksumMismatch.into());
        }

        if id == PacketId::Version {
            if body.len() != 3 {
                return Err(FramingError::PayloadMismatch.into());
            }
            let version = (body[1], body[2]);
            if version != PROTOCOL_VERSION {
                return Err(ProtocolError::VersionMismatch {
                    found: version,
                    expected: PROTOCOL_VERSION,
                }
                .into());
            }
            return Ok(Self {
                id,
                version: Some(version),
                payload: None,
            });
        }

        Ok(Self {
            id,
            version: None,
            payload: Some(body[1..].to_vec()),
        })
    }
}

/// Accumulates raw transport bytes until a full COBS frame (delimited by
/// `0x00`) is available.
struct FrameScanner {
    scratch: Vec<u8>,
}

impl FrameScanner {
    fn new() -> Self {
        Self { scratch: Vec::new() }
    }

    /// Pulls one frame's raw bytes (terminator stripped) out of `scratch`
    /// if a complete one is buffered.
    fn take_frame(&mut self) -> Option<Vec<u8>> {
        let pos = self.scratch.iter().position(|&b| b == 0)?;
        let frame = self.scratch[..pos].to_vec();
        self.scratch.drain(..=pos);
        Some(frame)
    }

    fn feed(&mut self, bytes: &[u8]) {
        self.scratch.extend_from_slice(bytes);
    }
}

/// Reliable, ordered packet delivery over a raw byte transport.
pub struct HsuartFramer<T: Transport> {
    transport: T,
    scanner: FrameScanner,
    ring: BoundedBuffer,
    retry_budget: usize,
}

impl<T: Transport> HsuartFramer<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            scanner: FrameScanner::new(),
            ring: BoundedBuffer::new(READY_TO_READ_RING_CAP),
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Reads the next complete packet off the wire, pulling fresh bytes
    /// from the transport as needed.
    async fn read_packet(&mut self) -> Result<HsuartPacket, HsuartError> {
        loop {
            if let Some(frame) = self.scanner.take_frame() {
                return HsuartPacket::decode(&frame);
            }
            let mut buf = [0u8; 256];
            let n = self.transport.rx_blocking(&mut buf, buf.len()).await?;
            if n == 0 {
                return Err(TransportError::Timeout.into());
            }
            self.scanner.feed(&buf[..n]);
        }
    }

    async fn write_packet(&mut self, packet: &HsuartPacket) -> Result<(), HsuartError> {
        trace!("hsuart tx {:?}", packet.id);
        self.transport.tx_blocking(&packet.encode()).await?;
        Ok(())
    }

    /// Sends `packet` and waits for the peer's ACK, retransmitting on NAK or
    /// a garbled/no reply, up to the configured retry budget.
    async fn send_with_ack(&mut self, packet: &HsuartPacket) -> Result<(), HsuartError> {
        for attempt in 0..=self.retry_budget {
            self.write_packet(packet).await?;
            match self.read_packet().await {
                Ok(reply) if reply.id == PacketId::Ack => return Ok(()),
                Ok(reply) if reply.id == PacketId::Nak => {
                    warn!("peer NAK'd packet {:?}, attempt {attempt}", packet.id);
                }
                Ok(other) => {
                    warn!("expected ACK/NAK, got {:?}; retransmitting", other.id);
                }
                Err(e) => {
                    warn!("garbled reply while awaiting ACK ({e}); retransmitting");
                }
            }
        }
        Err(HsuartError::RetryBudgetExhausted)
    }

    /// Receives one packet and immediately ACKs or NAKs it based on CRC
    /// validity, per the receiver half of §4.2's reliability contract.
    async fn receive_and_ack(&mut self) -> Result<HsuartPacket, HsuartError> {
        loop {
            match self.read_packet().await {
                Ok(packet) => {
                    self.write_packet(&HsuartPacket::ack()).await?;
                    return Ok(packet);
                }
                Err(HsuartError::Framing(FramingError::ChecksumMismatch)) => {
                    debug!("CRC failure on inbound packet, sending NAK");
                    self.write_packet(&HsuartPacket::nak()).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Blocks until a READY_TO_READ packet arrives, buffering any other
    /// packets observed in the meantime into the flow-control ring so a
    /// later raw read can still see them (§4.2).
    async fn wait_ready_to_read(&mut self) -> Result<(), HsuartError> {
        loop {
            let packet = self.read_packet().await?;
            if packet.id == PacketId::ReadyToRead {
                return Ok(());
            }
            let bytes = packet.encode();
            if self.ring.append(&bytes).is_err() {
                warn!("flow-control ring overflowed; dropping buffered packet");
                return Err(FramingError::BufferOverflow.into());
            }
        }
    }

    /// Splits `payload` into `ceil(len / MAX_FRAGMENT_PAYLOAD)` fragments
    /// (all but the last tagged `Protocol`, the last tagged
    /// `EndOfTransfer`), waits for flow control, and reliably delivers each
    /// fragment in order (§4.2 Segmentation on TX).
    pub async fn send_block(&mut self, payload: &[u8]) -> Result<(), HsuartError> {
        self.wait_ready_to_read().await?;

        let chunks: Vec<&[u8]> = if payload.is_empty() {
            vec![&[]]
        } else {
            payload.chunks(MAX_FRAGMENT_PAYLOAD).collect()
        };
        let last = chunks.len() - 1;

        for (i, chunk) in chunks.into_iter().enumerate() {
            let id = if i == last {
                PacketId::EndOfTransfer
            } else {
                PacketId::Protocol
            };
            self.send_with_ack(&HsuartPacket::data(id, chunk.to_vec()))
                .await?;
        }
        Ok(())
    }

    /// Reassembles successive `Protocol` payloads until an
    /// `EndOfTransfer` arrives, returning the concatenation (§4.2
    /// Reassembly on RX). Drains the flow-control ring first, then reads
    /// fresh frames, preserving order.
    pub async fn receive_block(&mut self) -> Result<Vec<u8>, HsuartError> {
        let mut out = Vec::new();
        loop {
            let packet = if !self.ring.is_empty() {
                let buffered = self.ring.as_slice().to_vec();
                self.ring.consume(buffered.len());
                // The ring holds fully-encoded packets concatenated; feed
                // them back through the scanner so decoding stays uniform.
                self.scanner.feed(&buffered);
                match self.scanner.take_frame() {
                    Some(frame) => HsuartPacket::decode(&frame)?,
                    None => self.receive_and_ack().await?,
                }
            } else {
                self.receive_and_ack().await?
            };

            match packet.id {
                PacketId::Protocol => {
                    out.extend(packet.payload.unwrap_or_default());
                }
                PacketId::EndOfTransfer => {
                    out.extend(packet.payload.unwrap_or_default());
                    return Ok(out);
                }
                other => {
                    warn!("unexpected packet {other:?} while reassembling a block");
                }
            }
        }
    }

    /// Sends the fixed VERSION handshake packet and expects the peer to
    /// echo a matching one back.
    pub async fn exchange_version(&mut self) -> Result<(), HsuartError> {
        self.send_with_ack(&HsuartPacket::version()).await
    }
}
