//! Firehose Session (§4.3) — XML request/response dispatch over a raw
//! transport, with interleaved log callbacks and an optional VIP table
//! side-channel on the TX path.
//!
//! Firehose is plain XML over serial: there is no HSUART framing here (see
//! §6 "Wire, Firehose serial COM" — a separate wire profile from HSUART).

pub mod vip;
pub mod xml;

use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::{SessionError, TransportError};
use crate::mem::BoundedBuffer;
use crate::transport::Transport;
use vip::{VipMode, VipState, VipTableSource, SIGNED_TABLE_MAX};
use xml::ScanResult;

/// Size of the Firehose XML receive-reassembly buffer (§3).
pub const FIREHOSE_RX_CAP: usize = 4096;

/// Total allowed inactivity (no log, no response) before a command fails
/// (§4.3 step 5).
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(120);

const READ_CHUNK: usize = 512;

/// Ships XML commands, receives XML responses, routes interleaved `<log>`
/// frames to a callback, and runs the VIP table side-channel when enabled.
pub struct FirehoseSession<T: Transport> {
    transport: T,
    rx: BoundedBuffer,
    vip: VipState,
    vip_source: Option<Box<dyn VipTableSource>>,
    log_sink: Option<Box<dyn FnMut(&str)>>,
}

impl<T: Transport> FirehoseSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            rx: BoundedBuffer::new(FIREHOSE_RX_CAP),
            vip: VipState::disabled(),
            vip_source: None,
            log_sink: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Installs a callback invoked with the quoted value of every `<log>`
    /// record observed while waiting for a response. Per §5, the callback
    /// must not re-enter the session — it is given a plain `&str`.
    pub fn set_log_sink(&mut self, sink: Box<dyn FnMut(&str)>) {
        self.log_sink = Some(sink);
    }

    /// Enables VIP: the next `send_command` will deliver the signed table
    /// before any payload (§4.3 `INIT`).
    pub fn enable_vip(&mut self, source: Box<dyn VipTableSource>, digests_per_table: u16) {
        self.vip = VipState::with_digests_per_table(digests_per_table);
        self.vip.enable();
        self.vip_source = Some(source);
    }

    pub fn vip_mode(&self) -> VipMode {
        self.vip.mode
    }

    /// Sends `xml` (subject to the VIP state machine, if enabled) and
    /// returns the raw `<response>` record's XML text.
    pub async fn send_command(&mut self, xml: &str) -> Result<String, SessionError> {
        self.dispatch_tx(xml.as_bytes()).await?;
        self.read_response().await
    }

    async fn dispatch_tx(&mut self, payload: &[u8]) -> Result<(), SessionError> {
        loop {
            match self.vip.mode {
                VipMode::Disabled => {
                    self.transport.tx_blocking(payload).await?;
                    return Ok(());
                }
                VipMode::Init => {
                    let table = {
                        let source = self.vip_source.as_mut().ok_or(
                            SessionError::VipStateViolation("VIP enabled with no table source"),
                        )?;
                        source.read_signed_table()?
                    };
                    if table.len() > SIGNED_TABLE_MAX {
                        return Err(SessionError::OutOfMemory);
                    }
                    debug!("VIP: sending signed table ({} bytes)", table.len());
                    self.transport.tx_blocking(&table).await?;
                    self.expect_ack_response().await?;
                    self.vip.signed_table_acked();
                }
                VipMode::SendNextTable => {
                    let chunk = {
                        let source = self.vip_source.as_mut().ok_or(
                            SessionError::VipStateViolation("VIP enabled with no table source"),
                        )?;
                        source.read_chained_chunk(self.vip.chained_table_size)?
                    };
                    debug!("VIP: sending chained table chunk ({} bytes)", chunk.len());
                    self.transport.tx_blocking(&chunk).await?;
                    self.expect_ack_response().await?;
                    self.vip.chained_table_acked();
                }
                VipMode::SendData => {
                    self.transport.tx_blocking(payload).await?;
                    self.vip.record_payload_sent();
                    return Ok(());
                }
            }
        }
    }

    /// Reads one response record and requires it to be an ACK; any other
    /// outcome is a `TargetNak` that aborts the session (§4.3).
    async fn expect_ack_response(&mut self) -> Result<(), SessionError> {
        let response = self.read_response().await?;
        if response_is_ack(&response) {
            Ok(())
        } else {
            warn!("VIP table delivery was not ACK'd: {response}");
            Err(SessionError::TargetNak)
        }
    }

    /// RX state machine (§4.3): scans for `<?xml`, extracts records,
    /// routes `<log>` to the sink while resetting the inactivity timer,
    /// and returns on the first `<response>` record.
    async fn read_response(&mut self) -> Result<String, SessionError> {
        let mut deadline = Instant::now() + INACTIVITY_TIMEOUT;

        loop {
            loop {
                match xml::extract_record(self.rx.as_slice()) {
                    ScanResult::Record { record, consumed } => {
                        self.rx.consume(consumed);
                        if record.tag.starts_with("log") {
                            if let Some(sink) = self.log_sink.as_mut() {
                                sink(record.value.as_deref().unwrap_or(""));
                            }
                            deadline = Instant::now() + INACTIVITY_TIMEOUT;
                            continue;
                        }
                        return Ok(record.raw);
                    }
                    ScanResult::Discard(n) => {
                        warn!("discarding {n} bytes preceding the next <?xml marker");
                        self.rx.consume(n);
                        continue;
                    }
                    ScanResult::NoDelimiterYet { discard } => {
                        self.rx.consume(discard);
                        break;
                    }
                    ScanResult::Incomplete => break,
                }
            }

            if Instant::now() >= deadline {
                return Err(TransportError::Timeout.into());
            }

            let mut buf = [0u8; READ_CHUNK];
            let n = self.transport.rx_blocking(&mut buf, buf.len()).await?;
            if n > 0 {
                self.rx.append(&buf[..n])?;
            }
        }
    }
}

fn response_is_ack(xml: &str) -> bool {
    matches!(
        xml::extract_record(xml.as_bytes()),
        ScanResult::Record { record, .. } if record.value.as_deref() == Some("ACK")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::sim::ScriptedTransport;

    #[tokio::test]
    async fn send_command_returns_response_record() {
        let reply = br#"<?xml version="1.0"?><data><response value="ACK"/></data>"#.to_vec();
        let mut session = FirehoseSession::new(ScriptedTransport::replies(vec![reply.clone()]));
        let response = session.send_command("<data><configure/></data>").await.unwrap();
        assert_eq!(response, String::from_utf8(reply).unwrap());
    }

    #[tokio::test]
    async fn log_records_invoke_sink_without_consuming_response_budget() {
        let logged = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let logged_clone = logged.clone();

        let stream = [
            br#"<?xml version="1.0"?><data><log value="one"/></data>"#.as_slice(),
            br#"<?xml version="1.0"?><data><log value="two"/></data>"#.as_slice(),
            br#"<?xml version="1.0"?><data><response value="ACK"/></data>"#.as_slice(),
        ]
        .concat();

        let mut session = FirehoseSession::new(ScriptedTransport::replies(vec![stream]));
        session.set_log_sink(Box::new(move |v: &str| {
            logged_clone.lock().unwrap().push(v.to_string());
        }));

        let response = session.send_command("<data><configure/></data>").await.unwrap();
        assert!(response.contains("response"));
        assert_eq!(*logged.lock().unwrap(), vec!["one", "two"]);
    }

    struct FixedTableSource {
        signed: Vec<u8>,
        chained: Vec<u8>,
        chained_offset: usize,
    }

    impl VipTableSource for FixedTableSource {
        fn read_signed_table(&mut self) -> std::io::Result<Vec<u8>> {
            Ok(self.signed.clone())
        }

        fn read_chained_chunk(&mut self, max: usize) -> std::io::Result<Vec<u8>> {
            let remaining = &self.chained[self.chained_offset..];
            let n = max.min(remaining.len());
            let chunk = remaining[..n].to_vec();
            self.chained_offset += n;
            Ok(chunk)
        }
    }

    #[tokio::test]
    async fn vip_init_sends_signed_table_before_first_payload() {
        let ack = br#"<?xml version="1.0"?><data><response value="ACK"/></data>"#.to_vec();
        let transport = ScriptedTransport::replies(vec![ack.clone(), ack]);
        let mut session = FirehoseSession::new(transport);
        session.enable_vip(
            Box::new(FixedTableSource {
                signed: vec![0xAB; 64],
                chained: vec![0xCD; vip::CHAINED_TABLE_SIZE * 2],
                chained_offset: 0,
            }),
            256,
        );

        session.send_command("payload-1").await.unwrap();
        assert_eq!(session.vip_mode(), VipMode::SendData);
        assert_eq!(session.transport().sent[0], vec![0xAB; 64]);
        assert_eq!(session.transport().sent[1], b"payload-1".to_vec());
    }
}
