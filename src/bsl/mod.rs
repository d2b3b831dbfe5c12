//! Bootloader Session (§4.5) — drives the BROM → FDL1 → FDL2 handshake and
//! the partition read/write/erase/enumerate operations on top of an
//! [`HdlcFramer`].

pub mod chip;
pub mod opcodes;

use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::{FramingError, SessionError, TransportError};
use crate::hdlc::HdlcFramer;
use crate::transport::Transport;

/// Chunk size while the device is in BROM mode (§3).
pub const BROM_CHUNK_SIZE: usize = 528;
/// Chunk size once FDL1 (or FDL2) is running (§3).
pub const FDL_CHUNK_SIZE: usize = 2112;

const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);
const ERASE_TIMEOUT: Duration = Duration::from_secs(60);
const HANDSHAKE_POKE_TIMEOUT: Duration = Duration::from_secs(2);
const EXEC_REOPEN_ROUNDS: usize = 20;
const CHECK_BAUD_ROUNDS: usize = 20;

/// A curated fallback list used when the device doesn't support
/// `READ_PARTITION` enumeration (§4.5 partition enumeration).
const CURATED_PARTITION_NAMES: &[&str] = &[
    "splloader", "uboot", "boot", "recovery", "system", "userdata", "misc", "cache",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BslMode {
    Brom,
    Fdl,
}

/// Bootloader session state (§3). `Error` is absorbing: every public
/// operation refuses to run once the session has reached it.
#[derive(Debug)]
pub enum BslState {
    Disconnected,
    Connected(BslMode),
    Fdl1Loaded,
    Fdl2Loaded,
    Error,
}

/// Drives a BROM/FDL1/FDL2 bootloader conversation. Owns its [`HdlcFramer`]
/// and keeps the framer's mode bits and chunk size in lockstep with
/// `state`, per the §3 invariant that they must always agree.
pub struct BslSession<T: Transport> {
    transport: T,
    framer: HdlcFramer,
    state: BslState,
    chunk_size: usize,
    rx_scratch: Vec<u8>,
    pub brom_version: Option<String>,
}

impl<T: Transport> BslSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            framer: HdlcFramer::new(),
            state: BslState::Disconnected,
            chunk_size: BROM_CHUNK_SIZE,
            rx_scratch: Vec::new(),
            brom_version: None,
        }
    }

    pub fn state(&self) -> &BslState {
        &self.state
    }

    pub fn framer(&self) -> &HdlcFramer {
        &self.framer
    }

    /// Test-only seam: jumps straight to a given state and chunk size so
    /// integration tests can exercise one transition (e.g. the FDL2 EXEC_DATA
    /// boundary) without replaying the whole handshake/FDL1 climb.
    #[doc(hidden)]
    pub fn set_state_for_test(&mut self, state: BslState, chunk_size: usize) {
        self.state = state;
        self.chunk_size = chunk_size;
    }

    /// Test-only seam: flips the framer to the post-FDL1 mode (little-endian,
    /// additive checksum) a real `download_fdl1` would have left it in, so
    /// [`Self::set_state_for_test`] shortcuts into `Fdl1Loaded`/`Fdl2Loaded`
    /// don't leave the framer in the BROM mode it starts in.
    #[doc(hidden)]
    pub fn set_fdl_framer_mode_for_test(&mut self) {
        self.framer.big_endian = false;
        self.framer.crc16_mode = false;
    }

    /// Explicit disconnect — the only path back out of `Fdl1Loaded` /
    /// `Fdl2Loaded` (§8 property 8).
    pub fn disconnect(&mut self) {
        self.state = BslState::Disconnected;
        self.framer = HdlcFramer::new();
        self.chunk_size = BROM_CHUNK_SIZE;
        self.rx_scratch.clear();
    }

    async fn send_frame(&mut self, cmd: u16, payload: &[u8]) -> Result<(), SessionError> {
        let wire = self.framer.build_frame(cmd, payload);
        self.transport.tx_blocking(&wire).await?;
        Ok(())
    }

    async fn recv_frame(&mut self, timeout: Duration) -> Result<crate::hdlc::HdlcFrame, SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.framer.scan_frame(&self.rx_scratch) {
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
            let mut buf = [0u8; 512];
            let n = self.transport.rx_blocking(&mut buf, buf.len()).await?;
            if n > 0 {
                self.rx_scratch.extend_from_slice(&buf[..n]);
            }
        }
    }

    async fn send_and_expect(
        &mut self,
        cmd: u16,
        payload: &[u8],
        expected: u8,
        timeout: Duration,
    ) -> Result<crate::hdlc::HdlcFrame, SessionError> {
        self.send_frame(cmd, payload).await?;
        let frame = self.recv_frame(timeout).await?;
        let code = frame.type_ as u8;
        if code == expected {
            Ok(frame)
        } else {
            Err(SessionError::UnexpectedResponse(code))
        }
    }

    async fn send_and_expect_any(
        &mut self,
        cmd: u16,
        payload: &[u8],
        expected: &[u8],
        timeout: Duration,
    ) -> Result<crate::hdlc::HdlcFrame, SessionError> {
        self.send_frame(cmd, payload).await?;
        let frame = self.recv_frame(timeout).await?;
        let code = frame.type_ as u8;
        if expected.contains(&code) {
            Ok(frame)
        } else {
            Err(SessionError::UnexpectedResponse(code))
        }
    }

    async fn send_with_retry(
        &mut self,
        cmd: u16,
        payload: &[u8],
        retries: usize,
    ) -> Result<(), SessionError> {
        let mut last_err = None;
        for attempt in 0..=retries {
            match self
                .send_and_expect(cmd, payload, opcodes::rsp::ACK, DEFAULT_RESPONSE_TIMEOUT)
                .await
            {
                Ok(_) => return Ok(()),
                Err(e) => {
                    warn!("command 0x{cmd:02X} attempt {attempt} failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap())
    }

    async fn send_chunk_with_retry(&mut self, chunk: &[u8], attempts: usize) -> Result<(), SessionError> {
        let mut last_err = None;
        for attempt in 0..attempts {
            match self
                .send_and_expect(
                    opcodes::cmd::MIDST_DATA,
                    chunk,
                    opcodes::rsp::ACK,
                    DEFAULT_RESPONSE_TIMEOUT,
                )
                .await
            {
                Ok(_) => return Ok(()),
                Err(e) => {
                    warn!("MIDST_DATA attempt {attempt} failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap())
    }

    /// Handshake (§4.5): a single `0x7E` poke, then a burst of three, then a
    /// `CONNECT` command, each waited on for up to 2 s.
    pub async fn handshake(&mut self) -> Result<(), SessionError> {
        self.framer = HdlcFramer::new();
        self.chunk_size = BROM_CHUNK_SIZE;

        if let Some(code) = self.poke(1).await? {
            return self.interpret_handshake_response(code);
        }
        if let Some(code) = self.poke(3).await? {
            return self.interpret_handshake_response(code);
        }
        self.send_frame(opcodes::cmd::CONNECT, &[]).await?;
        match self.read_single_byte(HANDSHAKE_POKE_TIMEOUT).await? {
            Some(code) => self.interpret_handshake_response(code),
            None => Err(SessionError::HandshakeFailed),
        }
    }

    async fn poke(&mut self, count: usize) -> Result<Option<u8>, SessionError> {
        let burst = vec![0x7Eu8; count];
        self.transport.tx_blocking(&burst).await?;
        self.read_single_byte(HANDSHAKE_POKE_TIMEOUT).await
    }

    async fn read_single_byte(&mut self, timeout: Duration) -> Result<Option<u8>, SessionError> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 1];
        loop {
            let n = self.transport.rx_blocking(&mut buf, 1).await?;
            if n > 0 {
                return Ok(Some(buf[0]));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    fn interpret_handshake_response(&mut self, code: u8) -> Result<(), SessionError> {
        match code {
            opcodes::rsp::VER => {
                debug!("BSL handshake: BROM VER response");
                self.state = BslState::Connected(BslMode::Brom);
                Ok(())
            }
            opcodes::rsp::ACK => {
                debug!("BSL handshake: ACK with no prior download, device already past BROM");
                self.state = BslState::Connected(BslMode::Fdl);
                Ok(())
            }
            other => {
                self.state = BslState::Error;
                Err(SessionError::UnexpectedResponse(other))
            }
        }
    }

    /// FDL1 download (§4.5): `CONNECT` → `START_DATA` → `MIDST_DATA`* →
    /// `END_DATA` → optional signature-bypass blob → `EXEC_DATA` (with port-
    /// reopen tolerance) → framer switch to little-endian/additive/FDL
    /// chunking → `CHECK_BAUD`.
    pub async fn download_fdl1(
        &mut self,
        base_addr: u32,
        blob: &[u8],
        signature_bypass: Option<(u32, &[u8])>,
    ) -> Result<(), SessionError> {
        if !matches!(self.state, BslState::Connected(_)) {
            return Err(SessionError::IncompatibleState);
        }

        self.framer = HdlcFramer::new();
        self.chunk_size = BROM_CHUNK_SIZE;

        self.send_and_expect_any(
            opcodes::cmd::CONNECT,
            &[],
            &[opcodes::rsp::ACK, opcodes::rsp::VER],
            DEFAULT_RESPONSE_TIMEOUT,
        )
        .await?;

        self.download_blob(base_addr, blob).await?;

        if let Some((exec_addr, sig)) = signature_bypass {
            self.download_blob(exec_addr, sig).await?;
        }

        self.exec_with_port_reopen_tolerance().await?;

        self.framer.crc16_mode = false;
        self.framer.big_endian = false;
        self.chunk_size = FDL_CHUNK_SIZE;
        self.check_baud_handshake().await?;

        self.state = BslState::Fdl1Loaded;
        Ok(())
    }

    async fn download_blob(&mut self, base_addr: u32, blob: &[u8]) -> Result<(), SessionError> {
        let mut start_payload = Vec::with_capacity(8);
        start_payload.extend_from_slice(&base_addr.to_be_bytes());
        start_payload.extend_from_slice(&(blob.len() as u32).to_be_bytes());
        self.send_with_retry(opcodes::cmd::START_DATA, &start_payload, 1).await?;

        for chunk in blob.chunks(self.chunk_size) {
            self.send_chunk_with_retry(chunk, 3).await?;
        }

        self.send_and_expect(
            opcodes::cmd::END_DATA,
            &[],
            opcodes::rsp::ACK,
            DEFAULT_RESPONSE_TIMEOUT,
        )
        .await?;
        Ok(())
    }

    /// `EXEC_DATA` may reset the device's USB endpoint; transport-level
    /// errors are tolerated (not just response mismatches) up to the
    /// 20-round budget. Re-opening the OS handle itself is the transport
    /// owner's responsibility — this session only owns the retry loop.
    async fn exec_with_port_reopen_tolerance(&mut self) -> Result<(), SessionError> {
        let mut last_err = None;
        for round in 0..EXEC_REOPEN_ROUNDS {
            match self
                .send_and_expect(
                    opcodes::cmd::EXEC_DATA,
                    &[],
                    opcodes::rsp::ACK,
                    DEFAULT_RESPONSE_TIMEOUT,
                )
                .await
            {
                Ok(_) => return Ok(()),
                Err(SessionError::Transport(e)) => {
                    warn!("EXEC_DATA round {round}: {e}, tolerating port reset and retrying");
                    last_err = Some(SessionError::Transport(e));
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(SessionError::HandshakeFailed))
    }

    /// `CHECK_BAUD` after the FDL1 exec boundary (§4.5): the first attempt
    /// commonly fails while the device reboots into FDL1; after a few
    /// rounds, also try the other checksum algorithm. Baud-rate swapping is
    /// left to the transport owner, since this session doesn't hold the
    /// serial path needed to reopen at a different rate.
    async fn check_baud_handshake(&mut self) -> Result<(), SessionError> {
        let mut last_err = None;
        for round in 0..CHECK_BAUD_ROUNDS {
            match self
                .send_and_expect_any(
                    opcodes::cmd::CHECK_BAUD,
                    &[],
                    &[opcodes::rsp::ACK, opcodes::rsp::VER],
                    HANDSHAKE_POKE_TIMEOUT,
                )
                .await
            {
                Ok(_) => return Ok(()),
                Err(e) => {
                    warn!("CHECK_BAUD round {round} failed: {e}");
                    if round == 3 {
                        self.framer.crc16_mode = !self.framer.crc16_mode;
                        debug!("CHECK_BAUD: swapping checksum algorithm to {:?}", self.framer.algorithm());
                    }
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(SessionError::HandshakeFailed))
    }

    /// FDL2 download (§4.5): identical to FDL1 except `EXEC_DATA` accepts
    /// `INCOMPATIBLE_PARTITION` as success, and `DISABLE_TRANSCODE` follows
    /// immediately after.
    pub async fn download_fdl2(&mut self, base_addr: u32, blob: &[u8]) -> Result<(), SessionError> {
        if !matches!(self.state, BslState::Fdl1Loaded) {
            return Err(SessionError::IncompatibleState);
        }
        self.chunk_size = FDL_CHUNK_SIZE;

        self.download_blob(base_addr, blob).await?;

        let exec = self
            .send_and_expect_any(
                opcodes::cmd::EXEC_DATA,
                &[],
                &[opcodes::rsp::ACK, opcodes::rsp::INCOMPATIBLE_PARTITION],
                DEFAULT_RESPONSE_TIMEOUT,
            )
            .await?;
        debug!("FDL2 EXEC_DATA response 0x{:02X}", exec.type_ as u8);

        self.state = BslState::Fdl2Loaded;

        self.send_and_expect_any(
            opcodes::cmd::DISABLE_TRANSCODE,
            &[],
            &[opcodes::rsp::ACK, opcodes::rsp::UNSUPPORTED_COMMAND],
            DEFAULT_RESPONSE_TIMEOUT,
        )
        .await?;
        self.framer.transcode = false;

        Ok(())
    }

    fn require_fdl2(&self) -> Result<(), SessionError> {
        match self.state {
            BslState::Fdl2Loaded => Ok(()),
            _ => Err(SessionError::IncompatibleState),
        }
    }

    /// Partition write (§4.5): `START_DATA` → `MIDST_DATA`* (≤2 retries per
    /// chunk, abort after 3 consecutive failures) → `END_DATA`.
    pub async fn write_partition(&mut self, name: &str, data: &[u8]) -> Result<(), SessionError> {
        self.require_fdl2()?;
        let start_payload = partition_start_payload(name, data.len() as u64);
        self.send_with_retry(opcodes::cmd::START_DATA, &start_payload, 1).await?;

        let mut consecutive_failures = 0u32;
        for chunk in data.chunks(FDL_CHUNK_SIZE) {
            let mut last_err = None;
            let mut sent = false;
            for attempt in 0..=2 {
                match self
                    .send_and_expect(
                        opcodes::cmd::MIDST_DATA,
                        chunk,
                        opcodes::rsp::ACK,
                        DEFAULT_RESPONSE_TIMEOUT,
                    )
                    .await
                {
                    Ok(_) => {
                        sent = true;
                        consecutive_failures = 0;
                        break;
                    }
                    Err(e) => {
                        warn!("partition write chunk attempt {attempt} failed: {e}");
                        last_err = Some(e);
                    }
                }
            }
            if !sent {
                consecutive_failures += 1;
                if consecutive_failures >= 3 {
                    return Err(last_err.unwrap());
                }
            }
        }

        self.send_and_expect(
            opcodes::cmd::END_DATA,
            &[],
            opcodes::rsp::ACK,
            DEFAULT_RESPONSE_TIMEOUT,
        )
        .await?;
        Ok(())
    }

    /// Partition read (§4.5): `READ_START` → `READ_MIDST`* (retry on CRC
    /// mismatch) → `READ_END`. `READ_MIDST` carries a 4 B high-word offset
    /// once `size` exceeds 4 GiB, matching the same 64-bit-mode threshold
    /// [`partition_start_payload`] uses for `READ_START`/`START_DATA`.
    pub async fn read_partition(&mut self, name: &str, size: usize) -> Result<Vec<u8>, SessionError> {
        self.require_fdl2()?;
        let size = size as u64;
        let sixty_four_bit = size > u32::MAX as u64;
        let start_payload = partition_start_payload(name, size);
        self.send_and_expect(
            opcodes::cmd::READ_START,
            &start_payload,
            opcodes::rsp::ACK,
            DEFAULT_RESPONSE_TIMEOUT,
        )
        .await?;

        let mut out = Vec::with_capacity(size as usize);
        let mut offset: u64 = 0;
        while (out.len() as u64) < size {
            let want = (size - out.len() as u64).min(FDL_CHUNK_SIZE as u64) as u32;
            let payload = read_midst_payload(want, offset, sixty_four_bit);

            let frame = loop {
                match self
                    .send_and_expect(
                        opcodes::cmd::READ_MIDST,
                        &payload,
                        opcodes::rsp::READ_FLASH,
                        DEFAULT_RESPONSE_TIMEOUT,
                    )
                    .await
                {
                    Ok(f) => break f,
                    Err(SessionError::Framing(FramingError::ChecksumMismatch)) => continue,
                    Err(e) => return Err(e),
                }
            };
            if frame.payload.is_empty() {
                break;
            }
            offset += frame.payload.len() as u64;
            out.extend_from_slice(&frame.payload);
        }

        self.send_and_expect(
            opcodes::cmd::READ_END,
            &[],
            opcodes::rsp::ACK,
            DEFAULT_RESPONSE_TIMEOUT,
        )
        .await?;
        Ok(out)
    }

    /// Partition erase (§4.5): `ERASE_FLASH` with a 60 s timeout.
    pub async fn erase_partition(&mut self, name: &str) -> Result<(), SessionError> {
        self.require_fdl2()?;
        let payload = utf16le_padded(name, 72);
        self.send_and_expect(opcodes::cmd::ERASE_FLASH, &payload, opcodes::rsp::ACK, ERASE_TIMEOUT)
            .await?;
        Ok(())
    }

    /// Partition enumeration (§4.5): prefers `READ_PARTITION`; falls back
    /// to probing a curated name list if the device reports
    /// `UNSUPPORTED_COMMAND`.
    pub async fn enumerate_partitions(&mut self) -> Result<Vec<(String, u32)>, SessionError> {
        self.require_fdl2()?;
        match self
            .send_and_expect(
                opcodes::cmd::READ_PARTITION,
                &[],
                opcodes::rsp::PARTITION,
                Duration::from_secs(10),
            )
            .await
        {
            Ok(frame) => Ok(parse_partition_records(&frame.payload)),
            Err(SessionError::UnexpectedResponse(code)) if code == opcodes::rsp::UNSUPPORTED_COMMAND => {
                self.enumerate_partitions_by_probe(CURATED_PARTITION_NAMES).await
            }
            Err(e) => Err(e),
        }
    }

    async fn enumerate_partitions_by_probe(
        &mut self,
        names: &[&str],
    ) -> Result<Vec<(String, u32)>, SessionError> {
        let mut found = Vec::new();
        let mut consecutive_timeouts = 0;
        for &name in names {
            match self.probe_partition(name).await {
                Ok(true) => {
                    found.push((name.to_string(), 8));
                    consecutive_timeouts = 0;
                }
                Ok(false) => consecutive_timeouts = 0,
                Err(SessionError::Transport(TransportError::Timeout)) => {
                    consecutive_timeouts += 1;
                    if consecutive_timeouts >= 5 {
                        break;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }

    async fn probe_partition(&mut self, name: &str) -> Result<bool, SessionError> {
        let start_payload = partition_start_payload(name, 8);
        self.send_and_expect(
            opcodes::cmd::READ_START,
            &start_payload,
            opcodes::rsp::ACK,
            Duration::from_secs(2),
        )
        .await?;

        let payload = read_midst_payload(8, 0, false);
        let frame = self
            .send_and_expect(
                opcodes::cmd::READ_MIDST,
                &payload,
                opcodes::rsp::READ_FLASH,
                Duration::from_secs(2),
            )
            .await?;

        self.send_and_expect(
            opcodes::cmd::READ_END,
            &[],
            opcodes::rsp::ACK,
            Duration::from_secs(2),
        )
        .await?;

        Ok(frame.payload.len() == 8)
    }
}

fn utf16le_padded(name: &str, total_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(total_len);
    for unit in name.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out.resize(total_len, 0);
    out
}

fn partition_start_payload(name: &str, size: u64) -> Vec<u8> {
    let mut payload = utf16le_padded(name, 72);
    payload.extend_from_slice(&(size as u32).to_le_bytes());
    if size > u32::MAX as u64 {
        payload.extend_from_slice(&((size >> 32) as u32).to_le_bytes());
    }
    payload
}

/// `READ_MIDST` payload (§4.5): 4 B chunk-size-to-read LE || 4 B offset LE,
/// plus a 4 B high-word offset LE when `sixty_four_bit` is set (mirrors the
/// optional high word [`partition_start_payload`] appends for sizes beyond
/// 4 GiB).
fn read_midst_payload(want: u32, offset: u64, sixty_four_bit: bool) -> Vec<u8> {
    let mut payload = Vec::with_capacity(12);
    payload.extend_from_slice(&want.to_le_bytes());
    payload.extend_from_slice(&(offset as u32).to_le_bytes());
    if sixty_four_bit {
        payload.extend_from_slice(&((offset >> 32) as u32).to_le_bytes());
    }
    payload
}

fn parse_partition_records(data: &[u8]) -> Vec<(String, u32)> {
    const RECORD_LEN: usize = 76;
    data.chunks_exact(RECORD_LEN)
        .map(|rec| {
            let name_units: Vec<u16> = rec[..72]
                .chunks_exact(2)
                .map(|b| u16::from_le_bytes([b[0], b[1]]))
                .collect();
            let name = String::from_utf16_lossy(&name_units)
                .trim_end_matches('\0')
                .to_string();
            let size = u32::from_le_bytes([rec[72], rec[73], rec[74], rec[75]]);
            (name, size)
        })
        .collect()
}

/// Splits `data` into chunks of `chunk_size`, returning the count — a
/// standalone helper so §8 property 6 can be checked without a transport.
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    (len + chunk_size - 1) / chunk_size
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::sim::ScriptedTransport;

    #[test]
    fn brom_chunking_reproduces_the_input_in_order() {
        let data: Vec<u8> = (0..2000u32).map(|i| (i % 256) as u8).collect();
        let chunks: Vec<&[u8]> = data.chunks(BROM_CHUNK_SIZE).collect();
        assert_eq!(chunks.len(), chunk_count(data.len(), BROM_CHUNK_SIZE));
        let reassembled: Vec<u8> = chunks.concat();
        assert_eq!(reassembled, data);
    }

    #[test]
    fn utf16le_padded_names_are_fixed_length() {
        assert_eq!(utf16le_padded("boot", 72).len(), 72);
        assert_eq!(utf16le_padded("a very long partition name indeed", 72).len(), 72);
    }

    #[tokio::test]
    async fn handshake_recognizes_brom_ver_response() {
        let mut session = BslSession::new(ScriptedTransport::replies(vec![vec![opcodes::rsp::VER]]));
        session.handshake().await.unwrap();
        assert!(matches!(session.state(), BslState::Connected(BslMode::Brom)));
    }

    #[tokio::test]
    async fn handshake_recognizes_ack_as_already_past_brom() {
        let mut session = BslSession::new(ScriptedTransport::replies(vec![vec![opcodes::rsp::ACK]]));
        session.handshake().await.unwrap();
        assert!(matches!(session.state(), BslState::Connected(BslMode::Fdl)));
    }

    #[tokio::test]
    async fn fdl2_accepts_incompatible_partition_as_success() {
        let framer = HdlcFramer::new();
        let ack = framer.build_frame(opcodes::rsp::ACK as u16, &[]);
        let incompatible = framer.build_frame(opcodes::rsp::INCOMPATIBLE_PARTITION as u16, &[]);
        let unsupported = framer.build_frame(opcodes::rsp::UNSUPPORTED_COMMAND as u16, &[]);

        let transport = ScriptedTransport::replies(vec![
            ack.clone(),        // START_DATA
            ack.clone(),        // MIDST_DATA
            ack,                // END_DATA
            incompatible,       // EXEC_DATA -> INCOMPATIBLE_PARTITION, still success
            unsupported,        // DISABLE_TRANSCODE -> UNSUPPORTED_COMMAND, still success
        ]);
        let mut session = BslSession::new(transport);
        session.state = BslState::Fdl1Loaded;
        session.chunk_size = FDL_CHUNK_SIZE;

        session.download_fdl2(0x9000_0000, b"fdl2 image bytes").await.unwrap();
        assert!(matches!(session.state(), BslState::Fdl2Loaded));
        assert!(!session.framer().transcode);
    }
}
