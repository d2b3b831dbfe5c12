//! VIP table sourcing from real files (§3 "two file handles (signed table,
//! chained tables)"), exercised against temp files rather than the in-memory
//! stub the unit tests use.

mod common;

use std::fs::File;
use std::io::{Read, Write};

use socflash_core::firehose::vip::{VipTableSource, CHAINED_TABLE_SIZE, SIGNED_TABLE_MAX};
use socflash_core::firehose::FirehoseSession;
use socflash_core::transport::sim::ScriptedTransport;

/// Reads the signed table and chained-tables stream from real files on
/// disk, the shape `FirehoseSession::enable_vip` actually expects a
/// collaborator to supply (§4.3 `INIT`/`SEND_NEXT_TABLE`).
struct FileVipSource {
    signed: File,
    chained: File,
}

impl VipTableSource for FileVipSource {
    fn read_signed_table(&mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.signed.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn read_chained_chunk(&mut self, max: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; max];
        let n = self.chained.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }
}

#[tokio::test]
async fn signed_table_under_the_16kib_cap_is_sent_whole_before_the_first_payload() {
    common::init_logging();

    let mut signed_file = tempfile::NamedTempFile::new().unwrap();
    let signed_bytes = vec![0x5Au8; 512];
    signed_file.write_all(&signed_bytes).unwrap();
    assert!(signed_bytes.len() <= SIGNED_TABLE_MAX);

    let mut chained_file = tempfile::NamedTempFile::new().unwrap();
    let chained_bytes = vec![0xC3u8; CHAINED_TABLE_SIZE * 2];
    chained_file.write_all(&chained_bytes).unwrap();

    let source = FileVipSource {
        signed: File::open(signed_file.path()).unwrap(),
        chained: File::open(chained_file.path()).unwrap(),
    };

    let ack = br#"<?xml version="1.0"?><data><response value="ACK"/></data>"#.to_vec();
    let transport = ScriptedTransport::replies(vec![ack.clone(), ack]);
    let mut session = FirehoseSession::new(transport);
    session.enable_vip(Box::new(source), 256);

    session.send_command("payload-1").await.unwrap();

    assert_eq!(session.transport().sent[0], signed_bytes);
    assert_eq!(session.transport().sent[1], b"payload-1".to_vec());
}
