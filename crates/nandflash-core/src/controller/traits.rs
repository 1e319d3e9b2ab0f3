//! Controller trait definitions

/// Controller registers used by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Configuration: timing, ECC, chip select, page size, bus width
    Config,
    /// Interrupt and transfer control
    Control,
    /// Command latch port
    Command,
    /// Address latch port
    Address,
    /// Data port, one bus word per access
    Data,
    /// Controller status: bit n is set while chip select n is ready
    Status,
}

/// Register-level access to a NAND flash controller
///
/// Implementors only need the three required methods. The provided helpers
/// describe the bus protocol in terms of them and may be overridden when a
/// controller can move data faster (FIFO, DMA).
pub trait NandController {
    /// Read a 32-bit controller register
    fn read_reg(&mut self, reg: Register) -> u32;

    /// Write a 32-bit controller register
    fn write_reg(&mut self, reg: Register, value: u32);

    /// Busy-wait for the given number of microseconds
    fn delay_us(&mut self, us: u32);

    /// Latch a command byte
    fn command(&mut self, opcode: u8) {
        self.write_reg(Register::Command, opcode as u32);
    }

    /// Latch one address cycle
    fn address(&mut self, cycle: u8) {
        self.write_reg(Register::Address, cycle as u32);
    }

    /// Read one byte from the data port
    fn read_byte(&mut self) -> u8 {
        self.read_reg(Register::Data) as u8
    }

    /// Read bytes from the data port
    fn read_data(&mut self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte = self.read_byte();
        }
    }

    /// Write bytes to the data port
    fn write_data(&mut self, data: &[u8]) {
        for &byte in data {
            self.write_reg(Register::Data, byte as u32);
        }
    }

    /// Read and discard bytes from the data port
    fn skip_data(&mut self, len: usize) {
        for _ in 0..len {
            let _ = self.read_reg(Register::Data);
        }
    }

    /// Write the same byte `len` times to the data port
    fn fill_data(&mut self, value: u8, len: usize) {
        for _ in 0..len {
            self.write_reg(Register::Data, value as u32);
        }
    }
}

impl<C: NandController + ?Sized> NandController for &mut C {
    fn read_reg(&mut self, reg: Register) -> u32 {
        (**self).read_reg(reg)
    }

    fn write_reg(&mut self, reg: Register, value: u32) {
        (**self).write_reg(reg, value)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }

    fn read_data(&mut self, buf: &mut [u8]) {
        (**self).read_data(buf)
    }

    fn write_data(&mut self, data: &[u8]) {
        (**self).write_data(data)
    }

    fn skip_data(&mut self, len: usize) {
        (**self).skip_data(len)
    }

    fn fill_data(&mut self, value: u8, len: usize) {
        (**self).fill_data(value, len)
    }
}

impl<C: NandController + ?Sized> NandController for alloc::boxed::Box<C> {
    fn read_reg(&mut self, reg: Register) -> u32 {
        (**self).read_reg(reg)
    }

    fn write_reg(&mut self, reg: Register, value: u32) {
        (**self).write_reg(reg, value)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }

    fn read_data(&mut self, buf: &mut [u8]) {
        (**self).read_data(buf)
    }

    fn write_data(&mut self, data: &[u8]) {
        (**self).write_data(data)
    }

    fn skip_data(&mut self, len: usize) {
        (**self).skip_data(len)
    }

    fn fill_data(&mut self, value: u8, len: usize) {
        (**self).fill_data(value, len)
    }
}
