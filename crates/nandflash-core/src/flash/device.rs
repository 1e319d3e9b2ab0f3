//! Block device contract
//!
//! The interface a generic block-device registry expects from a driver:
//! lifecycle hooks, sector-granular read/write and a control entry point.

use bitflags::bitflags;

use crate::error::Result;

bitflags! {
    /// Flags passed to [`BlockDevice::open`] and used at registration
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u16 {
        /// Read access
        const RDONLY = 0x001;
        /// Write access
        const WRONLY = 0x002;
        /// Read and write access
        const RDWR = Self::RDONLY.bits() | Self::WRONLY.bits();
    }
}

impl Default for OpenFlags {
    fn default() -> Self {
        OpenFlags::RDWR
    }
}

/// Geometry reported to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGeometry {
    /// Bytes in one sector (one NAND page)
    pub bytes_per_sector: u32,
    /// Bytes in one erase block
    pub block_size: u32,
    /// Number of sectors on the device
    pub sector_count: u32,
}

impl BlockGeometry {
    /// Device capacity in bytes
    pub fn capacity(&self) -> u64 {
        self.bytes_per_sector as u64 * self.sector_count as u64
    }
}

/// Control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Query the block geometry
    GetGeometry,
    /// Any other registry command code
    Other(u8),
}

/// Control command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlResponse {
    /// Answer to [`ControlCommand::GetGeometry`]
    Geometry(BlockGeometry),
}

/// A sector-addressed block device
///
/// Positions and counts are in sectors; buffers are in bytes and must hold
/// at least `count` sectors.
///
/// # Example
///
/// ```ignore
/// use nandflash_core::flash::{BlockDevice, OpenFlags};
///
/// fn first_sector<D: BlockDevice>(dev: &mut D) -> nandflash_core::Result<Vec<u8>> {
///     let mut buf = vec![0u8; dev.geometry().bytes_per_sector as usize];
///     dev.open(OpenFlags::RDONLY)?;
///     dev.read(0, &mut buf, 1)?;
///     dev.close()?;
///     Ok(buf)
/// }
/// ```
pub trait BlockDevice {
    /// One-time hardware bring-up
    fn init(&mut self) -> Result<()>;

    /// Open the device
    fn open(&mut self, flags: OpenFlags) -> Result<()>;

    /// Close the device
    fn close(&mut self) -> Result<()>;

    /// Read `count` sectors starting at sector `pos`
    ///
    /// Returns the number of sectors read.
    fn read(&mut self, pos: u32, buf: &mut [u8], count: usize) -> Result<usize>;

    /// Write `count` sectors starting at sector `pos`
    ///
    /// Returns the number of sectors written.
    fn write(&mut self, pos: u32, buf: &[u8], count: usize) -> Result<usize>;

    /// Execute a control command
    fn control(&mut self, cmd: ControlCommand) -> Result<ControlResponse>;

    /// Geometry of the device
    fn geometry(&self) -> BlockGeometry;
}

impl<D: BlockDevice + ?Sized> BlockDevice for alloc::boxed::Box<D> {
    fn init(&mut self) -> Result<()> {
        (**self).init()
    }

    fn open(&mut self, flags: OpenFlags) -> Result<()> {
        (**self).open(flags)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn read(&mut self, pos: u32, buf: &mut [u8], count: usize) -> Result<usize> {
        (**self).read(pos, buf, count)
    }

    fn write(&mut self, pos: u32, buf: &[u8], count: usize) -> Result<usize> {
        (**self).write(pos, buf, count)
    }

    fn control(&mut self, cmd: ControlCommand) -> Result<ControlResponse> {
        (**self).control(cmd)
    }

    fn geometry(&self) -> BlockGeometry {
        (**self).geometry()
    }
}
