//! §8 property 4 (HDLC escape involution), property 7 / S3 (receiver
//! auto-switch).

use socflash_core::hdlc::{escape, unescape, HdlcFramer};

#[test]
fn escape_unescape_is_involutive_and_hides_the_flag_byte() {
    for input in [
        &b""[..],
        &b"plain body, no specials"[..],
        &[0x7E, 0x7E, 0x7D, 0x01][..],
        &[0x7D; 20][..],
    ] {
        let escaped = escape(input);
        assert!(!escaped.iter().any(|&b| b == 0x7E));
        assert_eq!(unescape(&escaped).unwrap(), input);
    }
}

#[test]
fn s3_bsl_crc_auto_switch() {
    let mut sender = HdlcFramer::new();
    sender.crc16_mode = false; // additive

    let wire = sender.build_frame(0x04, b"exec data response payload");

    let mut receiver = HdlcFramer::new();
    assert_eq!(receiver.algorithm(), socflash_core::hdlc::checksum::ChecksumAlgorithm::Crc16);

    let (frame, consumed) = receiver.scan_frame(&wire).unwrap();
    assert_eq!(consumed, wire.len());
    assert_eq!(frame.payload, b"exec data response payload");
    assert_eq!(receiver.algorithm(), socflash_core::hdlc::checksum::ChecksumAlgorithm::Additive);
}

#[test]
fn second_frame_after_switch_decodes_under_the_adopted_algorithm() {
    let mut sender = HdlcFramer::new();
    sender.crc16_mode = false;
    let first = sender.build_frame(0x01, b"first");
    let second = sender.build_frame(0x02, b"second");

    let mut receiver = HdlcFramer::new();
    receiver.scan_frame(&first).unwrap();
    let (frame, _) = receiver.scan_frame(&second).unwrap();
    assert_eq!(frame.payload, b"second");
}
