//! Discriminated error families shared across the transport, framing, and
//! session layers.
//!
//! Each family is its own `thiserror` enum rather than one flat error type —
//! a framer should never be able to construct a `SessionError` directly, and
//! callers matching on a `TransportError` shouldn't have to skip over BSL
//! response codes that can never occur at that layer.

use thiserror::Error;

/// Errors surfaced by the [`Transport`](crate::transport::Transport) trait.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    #[error("transport not initialized")]
    NotInitialized,
    #[error("failed to open transport: {0}")]
    OpenFailed(String),
    #[error("read error: {0}")]
    ReadError(String),
    #[error("write error: {0}")]
    WriteError(String),
    #[error("operation timed out")]
    Timeout,
    #[error("operation not supported by this transport")]
    NotSupported,
}

/// Errors from the framing codecs (COBS, HDLC, CRC validation).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    #[error("frame shorter than the minimum valid length")]
    FrameTooShort,
    #[error("frame did not start with a valid delimiter")]
    InvalidDelimiter,
    #[error("frame ended before the declared length was reached")]
    FrameIncomplete,
    #[error("declared length does not match the actual payload size")]
    PayloadMismatch,
    #[error("checksum did not validate under any known algorithm")]
    ChecksumMismatch,
    #[error("COBS stuffing was malformed")]
    CobsInvalidStuffing,
    #[error("buffer overflow while reassembling a frame")]
    BufferOverflow,
}

/// Errors from the Firehose / BSL / Diag session state machines.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
    #[error("handshake with the device failed")]
    HandshakeFailed,
    #[error("unexpected response code 0x{0:02X}")]
    UnexpectedResponse(u8),
    #[error("device NAK'd the request")]
    DeviceNak,
    #[error("device reported a verify error (image/load-address mismatch)")]
    VerifyError,
    #[error("operation is not valid in the session's current state")]
    IncompatibleState,
    #[error("file I/O error: {0}")]
    FileIo(#[from] std::io::Error),
    #[error("out of memory servicing the request")]
    OutOfMemory,
    #[error("target NAK'd a VIP table delivery")]
    TargetNak,
    #[error("VIP state machine violation: {0}")]
    VipStateViolation(&'static str),
}

/// Protocol-level errors (wire format violations below the session layer).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("peer reported protocol version {found:?}, expected {expected:?}")]
    VersionMismatch {
        found: (u8, u8),
        expected: (u8, u8),
    },
    #[error("invalid packet id byte 0x{0:02X}")]
    InvalidPacketId(u8),
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
}
