//! Memory-mapped controller access
//!
//! # Safety
//!
//! This is the only place the driver dereferences raw addresses. The
//! caller of [`MmioController::new`] vouches for the base address.

use embedded_hal::delay::DelayNs;

use super::traits::{NandController, Register};

/// Byte offsets of the controller registers from its base address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMap {
    /// Configuration register
    pub config: usize,
    /// Control register
    pub control: usize,
    /// Command port
    pub command: usize,
    /// Address port
    pub address: usize,
    /// Data port
    pub data: usize,
    /// Status register
    pub status: usize,
}

impl RegisterMap {
    /// Consecutive 32-bit registers in declaration order
    pub const fn sequential() -> Self {
        Self {
            config: 0x00,
            control: 0x04,
            command: 0x08,
            address: 0x0c,
            data: 0x10,
            status: 0x14,
        }
    }

    /// Offset of a register
    pub const fn offset(&self, reg: Register) -> usize {
        match reg {
            Register::Config => self.config,
            Register::Control => self.control,
            Register::Command => self.command,
            Register::Address => self.address,
            Register::Data => self.data,
            Register::Status => self.status,
        }
    }
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self::sequential()
    }
}

/// Controller reached through volatile 32-bit register accesses
pub struct MmioController<D> {
    base: usize,
    map: RegisterMap,
    delay: D,
}

impl<D: DelayNs> MmioController<D> {
    /// Create a controller handle
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - `base` is the mapped address of the NAND controller
    /// - every offset in `map` is a valid, 4-byte aligned register
    /// - nothing else accesses these registers while the handle lives
    pub unsafe fn new(base: usize, map: RegisterMap, delay: D) -> Self {
        Self { base, map, delay }
    }

    /// Base address of the register block
    pub fn base(&self) -> usize {
        self.base
    }

    /// Register layout in use
    pub fn register_map(&self) -> &RegisterMap {
        &self.map
    }

    fn reg_ptr(&self, reg: Register) -> *mut u32 {
        (self.base + self.map.offset(reg)) as *mut u32
    }
}

impl<D: DelayNs> NandController for MmioController<D> {
    fn read_reg(&mut self, reg: Register) -> u32 {
        // SAFETY: address validity was guaranteed by the caller of `new`
        unsafe { core::ptr::read_volatile(self.reg_ptr(reg)) }
    }

    fn write_reg(&mut self, reg: Register, value: u32) {
        // SAFETY: address validity was guaranteed by the caller of `new`
        unsafe { core::ptr::write_volatile(self.reg_ptr(reg), value) }
    }

    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn test_register_map_offsets() {
        let map = RegisterMap::default();
        assert_eq!(map.offset(Register::Config), 0x00);
        assert_eq!(map.offset(Register::Status), 0x14);
    }

    #[test]
    fn test_volatile_access_on_ram() {
        let mut regs = [0u32; 6];
        let base = regs.as_mut_ptr() as usize;
        // SAFETY: `regs` outlives the controller and matches the map
        let mut ctrl = unsafe { MmioController::new(base, RegisterMap::sequential(), NoDelay) };

        ctrl.write_reg(Register::Config, 0xdead_beef);
        ctrl.command(0x70);
        ctrl.delay_us(10);
        assert_eq!(ctrl.read_reg(Register::Config), 0xdead_beef);
        assert_eq!(ctrl.read_reg(Register::Command), 0x70);
        drop(ctrl);
        assert_eq!(regs[2], 0x70);
    }
}
