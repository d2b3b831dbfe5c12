//! A bidirectional in-process transport for driving a session against a
//! scripted or echoing peer without any real serial hardware, used by the
//! integration tests and by callers wiring up offline tooling.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{InitGuard, Transport, TransportError, TransportKind};

/// Bound on how many scheduler turns [`PipeTransport::rx_blocking`] yields
/// waiting for a concurrently-running peer to push bytes before reporting a
/// short (possibly empty) read.
const WAIT_YIELDS: usize = 256;

/// One direction of a [`PipePair`].
#[derive(Debug, Default, Clone)]
struct Channel(Arc<Mutex<VecDeque<u8>>>);

impl Channel {
    fn push(&self, bytes: &[u8]) {
        self.0.lock().unwrap().extend(bytes.iter().copied());
    }

    fn pop_into(&self, buf: &mut [u8], max: usize) -> usize {
        let mut queue = self.0.lock().unwrap();
        let n = max.min(buf.len()).min(queue.len());
        for slot in buf.iter_mut().take(n) {
            *slot = queue.pop_front().unwrap();
        }
        n
    }
}

/// One end of an in-process duplex byte pipe. Bytes written with
/// `tx_blocking` become visible to the paired end's `rx_blocking` and vice
/// versa.
#[derive(Debug, Clone)]
pub struct PipeTransport {
    tx: Channel,
    rx: Channel,
    init: InitGuard,
    kind: TransportKind,
}

impl PipeTransport {
    /// Creates a connected pair of transports: writes to `.0` are readable
    /// from `.1`, and writes to `.1` are readable from `.0`.
    pub fn pair() -> (Self, Self) {
        let a = Channel::default();
        let b = Channel::default();
        (
            Self {
                tx: a.clone(),
                rx: b.clone(),
                init: InitGuard::new(),
                kind: TransportKind::PipeSim,
            },
            Self {
                tx: b,
                rx: a,
                init: InitGuard::new(),
                kind: TransportKind::PipeSim,
            },
        )
    }
}

impl Transport for PipeTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn init(&mut self) -> Result<(), TransportError> {
        self.init.init()
    }

    fn deinit(&mut self) {
        self.init.deinit();
    }

    async fn open(&mut self, _path: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn rx_blocking(&mut self, buf: &mut [u8], max: usize) -> Result<usize, TransportError> {
        // Give a concurrently-spawned peer a chance to push bytes before
        // giving up with a short (possibly empty) read, mirroring a real
        // transport's "block briefly, then return whatever arrived"
        // contract instead of sampling the queue once and bailing out.
        for _ in 0..WAIT_YIELDS {
            let n = self.rx.pop_into(buf, max);
            if n > 0 {
                return Ok(n);
            }
            tokio::task::yield_now().await;
        }
        Ok(self.rx.pop_into(buf, max))
    }

    async fn tx_blocking(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.tx.push(buf);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_echoes_in_both_directions() {
        let (mut a, mut b) = PipeTransport::pair();
        a.tx_blocking(b"hello").await.unwrap();
        let mut buf = [0u8; 16];
        let n = b.rx_blocking(&mut buf, 16).await.unwrap();
        assert_eq!(&buf[..n], b"hello");

        b.tx_blocking(b"world").await.unwrap();
        let n = a.rx_blocking(&mut buf, 16).await.unwrap();
        assert_eq!(&buf[..n], b"world");
    }

    #[test]
    fn init_guard_rejects_second_call() {
        let (mut a, _b) = PipeTransport::pair();
        a.init().unwrap();
        assert!(matches!(a.init(), Err(TransportError::InvalidParameter(_))));
        a.deinit();
        a.init().unwrap();
    }
}
