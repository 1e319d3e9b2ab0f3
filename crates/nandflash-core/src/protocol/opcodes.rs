//! Parallel NAND command opcodes

/// Read page, first cycle
pub const READ0: u8 = 0x00;
/// Read spare area only
pub const READOOB: u8 = 0x50;
/// Read page, confirm cycle (large-page devices)
pub const READSTART: u8 = 0x30;
/// Serial data input (program setup)
pub const SEQIN: u8 = 0x80;
/// Program confirm
pub const PAGEPROG: u8 = 0x10;
/// Block erase setup
pub const ERASE1: u8 = 0x60;
/// Block erase confirm
pub const ERASE2: u8 = 0xd0;
/// Read status
pub const STATUS: u8 = 0x70;
/// Read identification
pub const READID: u8 = 0x90;
/// Reset
pub const RESET: u8 = 0xff;

/// Status: device ready
pub const STATUS_READY: u8 = 0x40;
/// Status: last program or erase failed
pub const STATUS_FAIL: u8 = 0x01;
