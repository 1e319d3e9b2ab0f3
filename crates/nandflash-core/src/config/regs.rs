//! Configuration register layout
//!
//! Bit positions of the fields in the controller's configuration register.

/// ECC mask (1 = ECC engine bypassed)
pub const CFG_ECC_MASK_SHIFT: u32 = 29;
/// ECC mode (0 = 16-bit, 1 = 24-bit, 2 = 30-bit)
pub const CFG_ECC_MODE_SHIFT: u32 = 27;
/// Chip select
pub const CFG_CS_SHIFT: u32 = 25;
/// Command/address latch setup count
pub const CFG_TACLS_SHIFT: u32 = 18;
/// Write/read pulse width count
pub const CFG_TWRPH0_SHIFT: u32 = 11;
/// Write/read hold count
pub const CFG_TWRPH1_SHIFT: u32 = 4;
/// Page size code (0 = 2 KiB, 1 = 4 KiB, 2 = 8 KiB)
pub const CFG_PAGE_SIZE_SHIFT: u32 = 2;
/// Chip number (1 = single 16-bit chip)
pub const CFG_CHIP_NUM_SHIFT: u32 = 1;
/// Flash bus width (0 = 8-bit, 1 = 16-bit)
pub const CFG_FLASH_WIDTH_SHIFT: u32 = 0;

/// Mask of the chip-select field
pub const CFG_CS_MASK: u32 = 0x3 << CFG_CS_SHIFT;

/// Largest value a timing field can hold
pub const TIMING_FIELD_MAX: u32 = 0x7f;

/// Largest chip-select index the CS field can encode
pub const MAX_CHIP_SELECT: u8 = 3;

/// Build the chip-select field
pub const fn cs_field(cs: u8) -> u32 {
    ((cs as u32) << CFG_CS_SHIFT) & CFG_CS_MASK
}
