//! Deterministic test-scaffolding transports: the VIP sink (§4.1, §9) and a
//! scripted transport that replays canned responses for the scenario tests
//! in §8.

use std::collections::VecDeque;

use super::{InitGuard, Transport, TransportError, TransportKind};

/// The "VIP" transport tag is not a real link. `init()` on it always fails;
/// it exists only so offline tooling can ask a [`Transport`] implementation
/// to reject being mistaken for one. VIP (Validated Image Programming) is a
/// policy implemented in [`crate::firehose::vip`], orthogonal to which link
/// carries the bytes, deliberately kept independent of any one `Transport`.
#[derive(Debug, Default, Clone)]
pub struct VipSinkTransport {
    init: InitGuard,
}

impl VipSinkTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for VipSinkTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::VipSim
    }

    fn init(&mut self) -> Result<(), TransportError> {
        Err(TransportError::InvalidParameter(
            "the VIP transport kind is not a real link and cannot be initialized",
        ))
    }

    fn deinit(&mut self) {
        self.init.deinit();
    }

    async fn open(&mut self, _path: &str) -> Result<(), TransportError> {
        Err(TransportError::NotSupported)
    }

    async fn rx_blocking(&mut self, _buf: &mut [u8], _max: usize) -> Result<usize, TransportError> {
        Err(TransportError::NotSupported)
    }

    async fn tx_blocking(&mut self, _buf: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::NotSupported)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// A scripted step for [`ScriptedTransport`]: either bytes the simulator
/// hands back on the next `rx_blocking`, or a timeout (an empty read).
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Reply(Vec<u8>),
    TimeoutOnce,
}

/// A deterministic transport whose RX side plays back a fixed script and
/// whose TX side records everything written, for asserting on-wire bytes in
/// unit and scenario tests (§8 S1-S6).
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: VecDeque<ScriptStep>,
    pub sent: Vec<Vec<u8>>,
    init: InitGuard,
}

impl ScriptedTransport {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script: script.into(),
            sent: Vec::new(),
            init: InitGuard::new(),
        }
    }

    /// Convenience constructor: every scripted step is a reply (no induced
    /// timeouts).
    pub fn replies(replies: Vec<Vec<u8>>) -> Self {
        Self::new(replies.into_iter().map(ScriptStep::Reply).collect())
    }
}

impl Transport for ScriptedTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::PipeSim
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
        match self.script.pop_front() {
            Some(ScriptStep::Reply(bytes)) => {
                let n = max.min(buf.len()).min(bytes.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(ScriptStep::TimeoutOnce) => Ok(0),
            None => Err(TransportError::Timeout),
        }
    }

    async fn tx_blocking(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.sent.push(buf.to_vec());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vip_sink_rejects_init() {
        let mut t = VipSinkTransport::new();
        assert!(matches!(t.init(), Err(TransportError::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn scripted_transport_replays_in_order() {
        let mut t = ScriptedTransport::replies(vec![b"one".to_vec(), b"two".to_vec()]);
        let mut buf = [0u8; 8];
        let n = t.rx_blocking(&mut buf, 8).await.unwrap();
        assert_eq!(&buf[..n], b"one");
        let n = t.rx_blocking(&mut buf, 8).await.unwrap();
        assert_eq!(&buf[..n], b"two");
    }

    #[tokio::test]
    async fn scripted_transport_records_sent_bytes() {
        let mut t = ScriptedTransport::new(vec![]);
        t.tx_blocking(b"abc").await.unwrap();
        t.tx_blocking(b"def").await.unwrap();
        assert_eq!(t.sent, vec![b"abc".to_vec(), b"def".to_vec()]);
    }
}
