//! Real serial backend, built on `tokio-serial`/`serialport` with the same
//! open/configure/read/write shape as a typed async serial connection:
//! a builder chain for data bits, parity, and flow control, with
//! `tokio::io::{AsyncReadExt, AsyncWriteExt}` for the actual I/O.

use std::time::Duration;

use log::{debug, trace, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialStream;

use super::{InitGuard, SerialConfig, Transport, TransportEnumerator, TransportError, TransportKind};

/// POSIX `VMIN=1 VTIME=5` / Windows read-interval 20 ms, total 100 ms — the
/// short per-read timeout `rx_blocking` is allowed to return early from.
const SHORT_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// A real OS serial port, configured per §4.1 (8N1, the caller-selected
/// baud/flow-control profile).
pub struct SerialTransport {
    config: SerialConfig,
    port: Option<SerialStream>,
    init: InitGuard,
    kind: TransportKind,
}

impl SerialTransport {
    pub fn new(kind: TransportKind, config: SerialConfig) -> Self {
        Self {
            config,
            port: None,
            init: InitGuard::new(),
            kind,
        }
    }
}

impl Transport for SerialTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn init(&mut self) -> Result<(), TransportError> {
        self.init.init()
    }

    fn deinit(&mut self) {
        self.init.deinit();
        self.port = None;
    }

    async fn open(&mut self, path: &str) -> Result<(), TransportError> {
        if !self.init.is_initialized() {
            return Err(TransportError::NotInitialized);
        }

        let builder = tokio_serial::new(path, self.config.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(if self.config.rtscts {
                tokio_serial::FlowControl::Hardware
            } else {
                tokio_serial::FlowControl::None
            })
            .timeout(SHORT_READ_TIMEOUT);

        let stream = SerialStream::open(&builder)
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        debug!(
            "opened serial port {path} at {} baud (rtscts={})",
            self.config.baud_rate, self.config.rtscts
        );

        self.port = Some(stream);
        Ok(())
    }

    async fn rx_blocking(&mut self, buf: &mut [u8], max: usize) -> Result<usize, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotInitialized)?;
        let cap = max.min(buf.len());

        match tokio::time::timeout(SHORT_READ_TIMEOUT, port.read(&mut buf[..cap])).await {
            Ok(Ok(n)) => {
                trace!("serial rx {n} bytes");
                Ok(n)
            }
            // A timeout with zero bytes read is a valid short read, not an
            // error, per §4.1.
            Err(_) => Ok(0),
            Ok(Err(e)) => Err(TransportError::ReadError(e.to_string())),
        }
    }

    async fn tx_blocking(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotInitialized)?;

        let mut written = 0;
        let mut retries = 0;
        while written < buf.len() {
            if retries >= super::DEFAULT_TX_RETRY_BUDGET {
                return Err(TransportError::WriteError(
                    "exhausted retry budget with a partial write outstanding".into(),
                ));
            }
            match port.write(&buf[written..]).await {
                Ok(0) => {
                    warn!("serial tx accepted 0 bytes, retrying");
                    retries += 1;
                }
                Ok(n) => written += n,
                Err(e) => return Err(TransportError::WriteError(e.to_string())),
            }
        }

        port.flush()
            .await
            .map_err(|e| TransportError::WriteError(e.to_string()))?;
        trace!("serial tx {written} bytes");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.port = None;
        Ok(())
    }
}

/// Lists every OS-visible serial port, unfiltered. Unlike a VID-filtered
/// device scanner, this crate has no fixed vendor ID to match against, so
/// candidate filtering (if any) is left to the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSerialEnumerator;

impl TransportEnumerator for SystemSerialEnumerator {
    fn candidates(&self) -> Vec<String> {
        match tokio_serial::available_ports() {
            Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
            Err(e) => {
                warn!("serial port enumeration failed: {e}");
                Vec::new()
            }
        }
    }
}
