//! Transport abstraction — a uniform blocking TX/RX interface over serial
//! links, in-process pipes, and a deterministic simulator.
//!
//! Mirrors the shape of a typed `send_packet`/`receive_packet` connection
//! trait that borrows the transport for the duration of one call, but at the
//! byte level instead of the structured-packet level, since Firehose/HSUART/
//! HDLC each frame raw bytes differently on top of the same four primitive
//! operations.

pub mod pipe;
pub mod sim;
#[cfg(feature = "serial")]
pub mod serial;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use crate::error::TransportError;

/// Tag identifying which concrete transport is in use.
///
/// The "VIP" kind is deliberately not a real link — see
/// [`Transport::init`] — it exists purely so the session layer can ask
/// `type_of()` and refuse to treat it as one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Serial,
    Hsuart,
    VipSim,
    PipeSim,
}

/// Default bounded retry budget for `tx_blocking` when the OS accepts the
/// write in parts.
pub const DEFAULT_TX_RETRY_BUDGET: usize = 100;

/// A uniform blocking byte-transport.
///
/// `init` may be called exactly once per lifetime of a transport value;
/// implementations track this with [`InitGuard`]. A second call without an
/// intervening `deinit` must fail with [`TransportError::InvalidParameter`].
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Returns the tag for this transport instance.
    fn kind(&self) -> TransportKind;

    /// One-shot initialization gate. See [`InitGuard`].
    fn init(&mut self) -> Result<(), TransportError>;

    /// Reverses [`Transport::init`], permitting a subsequent re-init.
    fn deinit(&mut self);

    /// Opens the underlying handle at `path`.
    async fn open(&mut self, path: &str) -> Result<(), TransportError>;

    /// Reads up to `max` bytes into `buf`, returning the number of bytes
    /// actually read. Returns early with a short read on the implementation's
    /// timeout; never spins.
    async fn rx_blocking(&mut self, buf: &mut [u8], max: usize) -> Result<usize, TransportError>;

    /// Writes the entire buffer, retrying up to a bounded budget if the OS
    /// only accepts part of it. A partial write that exhausts the retry
    /// budget is an error, never a short `Ok`.
    async fn tx_blocking(&mut self, buf: &[u8]) -> Result<(), TransportError>;

    /// Closes the underlying handle.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Tracks the "call `init` at most once" contract shared by every concrete
/// transport, so each backend doesn't have to re-derive the bookkeeping.
#[derive(Debug, Default, Clone)]
pub struct InitGuard(Arc<AtomicBool>);

impl InitGuard {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Marks the transport initialized, failing if it already was.
    pub fn init(&self) -> Result<(), TransportError> {
        if self.0.swap(true, Ordering::SeqCst) {
            Err(TransportError::InvalidParameter(
                "init called twice without an intervening deinit",
            ))
        } else {
            Ok(())
        }
    }

    pub fn deinit(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_initialized(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A cooperative cancellation signal, checked at every suspension point
/// (§5). Cloning shares the same underlying flag.
#[derive(Debug, Default, Clone)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A source of candidate device paths, decoupled from any particular
/// platform's enumeration API. Generalizes the "find connected devices"
/// half of a serial connection module (which filters `available_ports()` by
/// USB vendor ID and groups the result into typed device handles) down to
/// opaque path strings — USB scanning *policy* (which vendor IDs count,
/// how multi-port devices are paired up) is out of scope for this crate.
pub trait TransportEnumerator {
    fn candidates(&self) -> Vec<String>;
}

/// Serial line configuration applied by [`Transport::open`] on a serial-
/// backed transport, per the §4.1 contract (8N1, baud defaults, flow
/// control, and platform-specific read timeouts).
#[derive(Debug, Clone, Copy)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub rtscts: bool,
}

impl SerialConfig {
    /// 115200 baud, 8N1, no flow control — the Firehose COM profile.
    pub const FIREHOSE: Self = Self {
        baud_rate: 115_200,
        rtscts: false,
    };

    /// 3 Mbaud, 8N1, RTS/CTS — the HSUART profile.
    pub const HSUART: Self = Self {
        baud_rate: 3_000_000,
        rtscts: true,
    };
}
