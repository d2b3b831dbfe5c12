//! Core protocol engines for a host-side mobile-SoC flashing toolkit.
//!
//! Three independent client stacks share a common [`transport`] abstraction
//! and error taxonomy ([`error`]):
//!
//! - [`hsuart`] + [`firehose`]: the HSUART transport framer (COBS, CRC16,
//!   ACK/NAK, VIP side-channel) and the Firehose XML session built on top of
//!   it.
//! - [`hdlc`] + [`bsl`]: the HDLC framing variant (switchable endianness,
//!   checksum algorithm, transcoding) and the BROM/FDL1/FDL2 bootloader
//!   session built on top of it.
//! - [`diag`]: the Diag client, its own HDLC-style framing and CRC variant,
//!   NV access, and the IMEI BCD codec.
//!
//! None of these stacks scans for hardware, parses firmware containers, or
//! looks up per-chip metadata — those are external collaborator contracts
//! (see [`bsl::chip::ChipMetaProvider`], [`firehose::vip::VipTableSource`]).

pub mod bsl;
pub mod diag;
pub mod error;
pub mod firehose;
pub mod hdlc;
pub mod hsuart;
pub mod mem;
pub mod transport;
