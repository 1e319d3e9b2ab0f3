//! Timing register derivation
//!
//! Converts datasheet timing in nanoseconds into the controller's
//! TACLS/TWRPH0/TWRPH1 counts for a given bus clock.

use crate::chip::NandTiming;
use crate::config::regs::TIMING_FIELD_MAX;
use crate::error::{Error, Result};

/// Timing register fields as written to the configuration register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimingRegisters {
    /// Command/address latch setup, in bus clocks
    pub tacls: u32,
    /// Strobe pulse width, in bus clocks minus one
    pub twrph0: u32,
    /// Strobe hold time, in bus clocks minus one
    pub twrph1: u32,
}

impl TimingRegisters {
    /// Length of one full write/read strobe cycle in bus clocks
    pub const fn cycle_clocks(&self) -> u32 {
        (self.twrph0 + 1) + (self.twrph1 + 1)
    }
}

/// Bus clock period in whole nanoseconds
///
/// Truncates like the hardware divider does: 240 MHz gives 4 ns.
pub const fn clock_period_ns(bus_clk_hz: u32) -> u32 {
    if bus_clk_hz == 0 {
        0
    } else {
        1_000_000_000 / bus_clk_hz
    }
}

fn ceil_div(value: u32, divisor: u32) -> u32 {
    value.div_ceil(divisor)
}

/// Derive the timing register fields for a chip at the given clock period
pub fn calculate_timing(timing: &NandTiming, clock_period_ns: u32) -> Result<TimingRegisters> {
    let clk = clock_period_ns;
    if clk == 0 {
        log::error!("Bus clock period is zero");
        return Err(Error::UnsupportedTiming);
    }

    let setup = timing.t_cls.max(timing.t_als);
    let Some(setup) = setup.checked_sub(timing.t_wp) else {
        log::error!(
            "Latch setup ({} ns) shorter than write pulse ({} ns)",
            timing.t_cls.max(timing.t_als),
            timing.t_wp
        );
        return Err(Error::UnsupportedTiming);
    };
    let tacls = ceil_div(setup, clk);

    let mut twrph0 = ceil_div(timing.t_wp.max(timing.t_rp), clk);
    let mut twrph1 = ceil_div(timing.t_wh.max(timing.t_reh), clk);
    if twrph0 == 0 || twrph1 == 0 {
        log::error!("Strobe pulse and hold times must be non-zero");
        return Err(Error::UnsupportedTiming);
    }

    let required = timing.t_wc.max(timing.t_rc);
    let mut i = 0u32;
    while (twrph0 + twrph1) * clk < required {
        if i % 2 == 0 {
            twrph0 += 1;
        } else {
            twrph1 += 1;
        }
        i += 1;
    }

    let regs = TimingRegisters {
        tacls,
        twrph0: twrph0 - 1,
        twrph1: twrph1 - 1,
    };

    if regs.tacls > TIMING_FIELD_MAX
        || regs.twrph0 > TIMING_FIELD_MAX
        || regs.twrph1 > TIMING_FIELD_MAX
    {
        log::error!("Timing {:?} does not fit the register fields", regs);
        return Err(Error::UnsupportedTiming);
    }

    log::debug!(
        "Timing at {} ns clock: TACLS={} TWRPH0={} TWRPH1={}",
        clk,
        regs.tacls,
        regs.twrph0,
        regs.twrph1
    );
    Ok(regs)
}
