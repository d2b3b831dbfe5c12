//! The Diag framing variant's CRC (§4.6): reflected CRC-16, init 0xFFFF,
//! final XOR 0xFFFF — the CRC-16/X-25 catalog entry, distinct from the
//! zero-xorout CRC-16/XMODEM used by HSUART and the BSL HDLC variant.

use crc::{Algorithm, Crc};

const DIAG_CRC16_ALGORITHM: Algorithm<u16> = Algorithm {
    poly: 0x1021,
    init: 0xFFFF,
    refin: true,
    refout: true,
    xorout: 0xFFFF,
    check: 0x906E,
    residue: 0xF0B8,
    width: 16,
};

pub const DIAG_CRC16: Crc<u16> = Crc::<u16>::new(&DIAG_CRC16_ALGORITHM);

pub fn crc16(data: &[u8]) -> u16 {
    DIAG_CRC16.checksum(data)
}

/// Because this algorithm is fully reflected (`refin == refout`), appending
/// the received check value in the same little-endian byte order the
/// algorithm itself emits reproduces the catalog's documented non-zero
/// residue — the same technique the `crc` crate's own conformance harness
/// uses to verify an algorithm definition.
pub fn validate(data: &[u8], received: u16) -> bool {
    let mut digest = DIAG_CRC16.digest();
    digest.update(data);
    digest.update(&received.to_le_bytes());
    digest.finalize() == DIAG_CRC16_ALGORITHM.residue
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_value_matches_the_catalog_entry() {
        assert_eq!(DIAG_CRC16.checksum(b"123456789"), 0x906E);
    }

    #[test]
    fn residue_holds_for_arbitrary_payloads() {
        for payload in [&b""[..], &b"diag frame"[..], &[0xAAu8; 40][..]] {
            let crc = crc16(payload);
            assert!(validate(payload, crc));
        }
    }

    #[test]
    fn corrupted_payload_fails_validation() {
        let payload = b"diag frame";
        let crc = crc16(payload);
        let mut corrupted = payload.to_vec();
        corrupted[0] ^= 0xFF;
        assert!(!validate(&corrupted, crc));
    }
}
