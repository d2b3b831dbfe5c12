//! BSL command/response opcode catalog (§6).
//!
//! The reference firmware aliases some opcodes (e.g. `0x05` as both
//! `NORMAL_RESET` and `RESET`, `0x1C` as both `ENABLE_SECUREBOOT` and
//! `READ_VERSION`). This driver picks one canonical name per opcode;
//! callers must not rely on aliasing.

#![allow(dead_code)]

pub mod cmd {
    pub const CONNECT: u16 = 0x00;
    pub const START_DATA: u16 = 0x01;
    pub const MIDST_DATA: u16 = 0x02;
    pub const END_DATA: u16 = 0x03;
    pub const EXEC_DATA: u16 = 0x04;
    pub const RESET: u16 = 0x05;
    pub const READ_FLASH: u16 = 0x06;
    pub const READ_CHIP_TYPE: u16 = 0x07;
    pub const CHANGE_BAUD: u16 = 0x09;
    pub const ERASE_FLASH: u16 = 0x0A;
    pub const READ_FLASH_INFO: u16 = 0x0D;
    pub const READ_START: u16 = 0x10;
    pub const READ_MIDST: u16 = 0x11;
    pub const READ_END: u16 = 0x12;
    pub const KEEP_CHARGE: u16 = 0x13;
    pub const POWER_OFF: u16 = 0x17;
    pub const READ_VERSION: u16 = 0x1C;
    pub const READ_PARTITION: u16 = 0x2D;
    pub const DISABLE_TRANSCODE: u16 = 0x21;
    pub const UNLOCK: u16 = 0x30;
    pub const READ_PUBKEY: u16 = 0x31;
    pub const SEND_SIGNATURE: u16 = 0x32;
    pub const READ_EFUSE: u16 = 0x60;
    pub const CHECK_BAUD: u16 = 0x7E;
    pub const END_PROCESS: u16 = 0x7F;
}

pub mod rsp {
    pub const ACK: u8 = 0x80;
    pub const VER: u8 = 0x81;
    // 0x82..=0x8F: documented single-byte error codes.
    pub const DESTINATION_ADDR_WRONG: u8 = 0x89;
    pub const SIZE_WRONG: u8 = 0x8A;
    pub const VERIFY_ERROR: u8 = 0x8B;
    pub const FLASH_INFO: u8 = 0x92;
    pub const READ_FLASH: u8 = 0x93;
    pub const INCOMPATIBLE_PARTITION: u8 = 0x96;
    pub const PARTITION: u8 = 0xBA;
    pub const UNSUPPORTED_COMMAND: u8 = 0xFE;
}

/// `true` if `code` is one of the documented single-byte error responses
/// (§4.5 error taxonomy, `0x82..=0x8F`).
pub fn is_error_response(code: u8) -> bool {
    (0x82..=0x8F).contains(&code)
}
