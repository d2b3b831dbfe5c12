//! CRC16 as used by the HSUART framer (§4.2, §8 property 2): polynomial
//! 0x1021, MSB-first, initial value 0 — this is the XMODEM variant of
//! CRC-16/CCITT. See `DESIGN.md` Open Question #4 for the residue value.

use crc::{Algorithm, Crc};

const HSUART_CRC16_ALGORITHM: Algorithm<u16> = Algorithm {
    poly: 0x1021,
    init: 0x0000,
    refin: false,
    refout: false,
    xorout: 0x0000,
    check: 0x31C3,
    residue: 0x0000,
    width: 16,
};

pub const HSUART_CRC16: Crc<u16> = Crc::<u16>::new(&HSUART_CRC16_ALGORITHM);

/// The residue a correctly received `payload || crc` sequence must produce.
pub const GOOD_RESIDUE: u16 = 0x0000;

/// Computes the CRC16 of `data`.
pub fn crc16(data: &[u8]) -> u16 {
    HSUART_CRC16.checksum(data)
}

/// Validates `payload` against a trailing CRC16 transmitted MSB-first, by
/// checking that `crc16(payload || crc_bytes) == GOOD_RESIDUE`.
pub fn validate(payload: &[u8], received_crc: u16) -> bool {
    let mut digest = HSUART_CRC16.digest();
    digest.update(payload);
    digest.update(&received_crc.to_be_bytes());
    digest.finalize() == GOOD_RESIDUE
}
