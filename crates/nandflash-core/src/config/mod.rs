//! Controller configuration
//!
//! Everything the controller needs to talk to a chip is derived once, at
//! initialisation, from the chip descriptor and the driver options: the
//! timing register fields, the ECC mode, the bus wiring and the page size
//! code. The result is immutable for the life of the driver.

mod ecc;
pub mod regs;
mod timing;

pub use ecc::*;
pub use timing::*;

use crate::chip::{BusType, ChipDescriptor};
use crate::error::{Error, Result};
use regs::*;

/// Default controller bus clock (240 MHz)
pub const DEFAULT_BUS_CLK_HZ: u32 = 240_000_000;

/// Bounds for every busy-wait in the driver
///
/// All waits count iterations, not wall-clock time; `poll_delay_us` is the
/// pause between two polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollLimits {
    /// Controller ready-bit polls after a chip select
    pub ready_polls: u32,
    /// Delay between two polls in microseconds
    pub poll_delay_us: u32,
    /// Status polls after a reset before giving up
    pub reset_retries: u32,
    /// Settle delay after the reset command in microseconds
    pub reset_settle_us: u32,
    /// Delay between issuing a read and transferring data, in microseconds
    pub read_settle_us: u32,
    /// Status polls while a page program is in progress
    pub program_polls: u32,
    /// Status polls while a block erase is in progress
    pub erase_polls: u32,
}

impl Default for PollLimits {
    fn default() -> Self {
        Self {
            ready_polls: 0x8_0000,
            poll_delay_us: 1,
            reset_retries: 2,
            reset_settle_us: 150_000,
            read_settle_us: 25,
            program_polls: 0x8_0000,
            erase_polls: 0x8_0000,
        }
    }
}

/// Options chosen by whoever brings the driver up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    /// Controller bus clock in Hz
    pub bus_clk_hz: u32,
    /// ECC selection policy
    pub ecc_policy: EccPolicy,
    /// Poll limits
    pub limits: PollLimits,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            bus_clk_hz: DEFAULT_BUS_CLK_HZ,
            ecc_policy: EccPolicy::default(),
            limits: PollLimits::default(),
        }
    }
}

/// Derived controller configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Timing register fields
    pub timing: TimingRegisters,
    /// ECC mode and step count
    pub ecc: EccSelection,
    /// Bus wiring
    pub bus: BusType,
    /// Number of chip selects in use
    pub chip_selects: u8,
    /// Page size field value
    pub page_size_code: u32,
    /// Whether the ECC engine is bypassed
    pub ecc_masked: bool,
}

/// Page size field value for a data page size
pub fn page_size_code(page_size: u32) -> Result<u32> {
    match page_size {
        2048 => Ok(0),
        4096 => Ok(1),
        8192 => Ok(2),
        _ => Err(Error::UnsupportedGeometry),
    }
}

impl ControllerConfig {
    /// Derive the configuration for a chip
    pub fn from_descriptor(chip: &ChipDescriptor, opts: &DriverOptions) -> Result<Self> {
        let geom = &chip.geometry;

        let page_size_code = page_size_code(geom.page_size).inspect_err(|_| {
            log::error!("Unsupported page size {}", geom.page_size);
        })?;

        if chip.chip_selects == 0 || chip.chip_selects > MAX_CHIP_SELECT + 1 {
            log::error!("Unsupported chip-select count {}", chip.chip_selects);
            return Err(Error::UnsupportedGeometry);
        }

        if !(1..=2).contains(&geom.col_cycles) || !(1..=4).contains(&geom.row_cycles) {
            log::error!(
                "Unsupported address cycles: {} column, {} row",
                geom.col_cycles,
                geom.row_cycles
            );
            return Err(Error::UnsupportedGeometry);
        }

        let row_space = 1u64 << (8 * geom.row_cycles as u64);
        let total_pages = geom.total_pages();
        let block_bytes = geom.page_size as u64 * geom.pages_per_block as u64;
        if geom.pages_per_block == 0
            || total_pages > row_space.min(u32::MAX as u64)
            || block_bytes > u32::MAX as u64
        {
            log::error!(
                "{} pages do not fit in {} row address cycles",
                total_pages,
                geom.row_cycles
            );
            return Err(Error::UnsupportedGeometry);
        }

        let timing = calculate_timing(&geom.timing, clock_period_ns(opts.bus_clk_hz))?;
        let ecc = select_ecc(geom.page_size, geom.spare_size, chip.bus, &opts.ecc_policy)?;

        Ok(Self {
            timing,
            ecc,
            bus: chip.bus,
            chip_selects: chip.chip_selects,
            page_size_code,
            ecc_masked: true,
        })
    }

    /// Configuration register value with the given chip selected
    pub fn register_image(&self, cs: u8) -> u32 {
        let (chip_num, width) = match self.bus {
            BusType::SingleChannel8Bit => (0, 0),
            BusType::DoubleChannel16Bit => (0, 1),
            BusType::SingleChannel16Bit => (1, 1),
        };

        ((self.ecc_masked as u32) << CFG_ECC_MASK_SHIFT)
            | (self.ecc.mode.register_value() << CFG_ECC_MODE_SHIFT)
            | cs_field(cs)
            | (self.timing.tacls << CFG_TACLS_SHIFT)
            | (self.timing.twrph0 << CFG_TWRPH0_SHIFT)
            | (self.timing.twrph1 << CFG_TWRPH1_SHIFT)
            | (self.page_size_code << CFG_PAGE_SIZE_SHIFT)
            | (chip_num << CFG_CHIP_NUM_SHIFT)
            | (width << CFG_FLASH_WIDTH_SHIFT)
    }
}
