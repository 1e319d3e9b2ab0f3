//! DeviceHandle - a brought-up NAND device plus what we know about its chip
//!
//! The handle owns the controller backend (type-erased), the runtime
//! context and the block-merge writer through [`NandDevice`]. The CLI works
//! only with this type and never sees the concrete controller.

use nandflash_core::chip::{BusType, ID_READ_LEN};
use nandflash_core::config::{EccSelection, TimingRegisters};
use nandflash_core::controller::NandController;
#[cfg(feature = "sim")]
use nandflash_core::controller::Register;
use nandflash_core::flash::{
    BlockDevice, BlockGeometry, MergeStats, NandContext, NandDevice, OpenFlags, PageAddr,
};
use nandflash_core::protocol;

use crate::error::DeviceError;

/// A controller backend the handle can drive
///
/// Backends are plain [`NandController`]s with a name and an optional
/// place to persist state when the handle is closed.
pub trait Backend: NandController {
    /// Short backend name (e.g., "sim")
    fn name(&self) -> &'static str;

    /// Persist backend state
    fn sync(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Type-erased backend
pub type BoxedBackend = Box<dyn Backend>;

/// Emulated controller, optionally backed by an image file
#[cfg(feature = "sim")]
pub struct SimBackend {
    sim: nandflash_sim::SimController,
    image: Option<std::path::PathBuf>,
}

#[cfg(feature = "sim")]
impl SimBackend {
    /// Wrap an emulator; with `image`, its pages are saved there on sync
    pub fn new(sim: nandflash_sim::SimController, image: Option<std::path::PathBuf>) -> Self {
        Self { sim, image }
    }

    /// The wrapped emulator
    pub fn sim(&self) -> &nandflash_sim::SimController {
        &self.sim
    }
}

#[cfg(feature = "sim")]
impl NandController for SimBackend {
    fn read_reg(&mut self, reg: Register) -> u32 {
        self.sim.read_reg(reg)
    }

    fn write_reg(&mut self, reg: Register, value: u32) {
        self.sim.write_reg(reg, value)
    }

    fn delay_us(&mut self, us: u32) {
        self.sim.delay_us(us)
    }

    fn read_data(&mut self, buf: &mut [u8]) {
        self.sim.read_data(buf)
    }

    fn write_data(&mut self, data: &[u8]) {
        self.sim.write_data(data)
    }

    fn skip_data(&mut self, len: usize) {
        self.sim.skip_data(len)
    }

    fn fill_data(&mut self, value: u8, len: usize) {
        self.sim.fill_data(value, len)
    }
}

#[cfg(feature = "sim")]
impl Backend for SimBackend {
    fn name(&self) -> &'static str {
        "sim"
    }

    fn sync(&mut self) -> Result<(), DeviceError> {
        if let Some(path) = &self.image {
            self.sim.save_image(path)?;
            log::debug!(
                "Saved {} programmed pages to {}",
                self.sim.programmed_pages(),
                path.display()
            );
        }
        Ok(())
    }
}

/// Chip information available from a DeviceHandle
#[derive(Debug, Clone)]
pub struct ChipInfo {
    /// Vendor name (e.g., "Hynix")
    pub vendor: String,
    /// Chip name (e.g., "H27UBG8T2A")
    pub name: String,
    /// Expected identification bytes
    pub id: Vec<u8>,
    /// Data bytes per page
    pub page_size: u32,
    /// Spare bytes per page
    pub spare_size: u32,
    /// Pages per erase block
    pub pages_per_block: u32,
    /// Number of erase blocks
    pub block_count: u32,
    /// Bus wiring
    pub bus: BusType,
    /// Selected ECC mode and step count
    pub ecc: EccSelection,
    /// Derived timing register fields
    pub timing: TimingRegisters,
    /// Configuration register image with chip 0 selected
    pub cfg_image: u32,
}

impl ChipInfo {
    /// Bytes per erase block (data only)
    pub fn block_size(&self) -> u32 {
        self.page_size * self.pages_per_block
    }

    /// Total data capacity in bytes
    pub fn total_size(&self) -> u64 {
        self.block_size() as u64 * self.block_count as u64
    }
}

impl From<&NandContext> for ChipInfo {
    fn from(ctx: &NandContext) -> Self {
        let geom = ctx.geometry();
        Self {
            vendor: ctx.chip.vendor.clone(),
            name: ctx.chip.name.clone(),
            id: ctx.chip.id.to_vec(),
            page_size: geom.page_size,
            spare_size: geom.spare_size,
            pages_per_block: geom.pages_per_block,
            block_count: geom.block_count,
            bus: ctx.chip.bus,
            ecc: ctx.config.ecc,
            timing: ctx.config.timing,
            cfg_image: ctx.config.register_image(0),
        }
    }
}

/// A brought-up NAND device
///
/// Similar to the `"nand"` entry of a [`DeviceRegistry`](crate::DeviceRegistry),
/// but keeps the page-level primitives reachable for debugging.
pub struct DeviceHandle {
    device: NandDevice<BoxedBackend>,
    chip_info: ChipInfo,
    backend: &'static str,
}

impl DeviceHandle {
    /// Bring the chip up and open it for reading and writing
    pub fn open(backend: BoxedBackend, ctx: NandContext) -> Result<Self, DeviceError> {
        let name = backend.name();
        let mut device = NandDevice::new(backend, ctx);
        device.init()?;
        device.open(OpenFlags::RDWR)?;
        let chip_info = ChipInfo::from(device.context());

        Ok(Self {
            device,
            chip_info,
            backend: name,
        })
    }

    /// Chip information
    pub fn chip_info(&self) -> &ChipInfo {
        &self.chip_info
    }

    /// Name of the controller backend
    pub fn backend_name(&self) -> &'static str {
        self.backend
    }

    /// Block device geometry
    pub fn geometry(&self) -> BlockGeometry {
        self.device.geometry()
    }

    /// Total data capacity in bytes
    pub fn size(&self) -> u64 {
        self.chip_info.total_size()
    }

    fn sectors_in(&self, len: usize) -> Result<usize, DeviceError> {
        let ps = self.chip_info.page_size as usize;
        if len % ps != 0 {
            return Err(nandflash_core::Error::InvalidAlignment.into());
        }
        Ok(len / ps)
    }

    /// Read whole pages starting at sector `pos`
    ///
    /// `buf` must be a whole number of pages long.
    pub fn read(&mut self, pos: u32, buf: &mut [u8]) -> Result<usize, DeviceError> {
        let count = self.sectors_in(buf.len())?;
        Ok(self.device.read(pos, buf, count)?)
    }

    /// Write whole pages starting at sector `pos`, merging as needed
    pub fn write(&mut self, pos: u32, data: &[u8]) -> Result<usize, DeviceError> {
        let count = self.sectors_in(data.len())?;
        Ok(self.device.write(pos, data, count)?)
    }

    /// Read one page's data and/or spare area
    pub fn read_page(
        &mut self,
        addr: PageAddr,
        data: Option<&mut [u8]>,
        oob: Option<&mut [u8]>,
    ) -> Result<(), DeviceError> {
        Ok(self.device.read_page(addr, data, oob)?)
    }

    /// Read one page's spare area
    pub fn read_oob(&mut self, addr: PageAddr, oob: &mut [u8]) -> Result<(), DeviceError> {
        self.read_page(addr, None, Some(oob))
    }

    /// Program one erased page
    pub fn write_page(&mut self, addr: PageAddr, data: &[u8]) -> Result<(), DeviceError> {
        Ok(self.device.write_page(addr, data)?)
    }

    /// Erase one block
    pub fn erase_block(&mut self, block: u32) -> Result<(), DeviceError> {
        Ok(self.device.erase_block(block)?)
    }

    /// Read and check the chip identification
    pub fn read_id(&mut self) -> Result<[u8; ID_READ_LEN], DeviceError> {
        Ok(self.device.read_id()?)
    }

    /// Read the identification bytes without checking them
    pub fn read_id_raw(&mut self) -> [u8; ID_READ_LEN] {
        protocol::read_id_raw(self.device.controller_mut())
    }

    /// Read the chip status byte
    pub fn read_status(&mut self) -> u8 {
        self.device.read_status()
    }

    /// Erase every block of the chip
    ///
    /// The chip ID is checked first. Blocks that report an erase failure are
    /// skipped and returned; any other error stops the erase. `progress` is
    /// called after each block.
    pub fn erase_chip<F: FnMut(u32)>(&mut self, mut progress: F) -> Result<Vec<u32>, DeviceError> {
        let id = self.device.read_id()?;
        log::info!("Erasing chip with ID {:02x?}", id);

        let mut failed = Vec::new();
        for block in 0..self.chip_info.block_count {
            match self.device.erase_block(block) {
                Ok(()) => {}
                Err(nandflash_core::Error::EraseFailure { block }) => {
                    log::warn!("Block {} failed to erase", block);
                    failed.push(block);
                }
                Err(e) => return Err(e.into()),
            }
            progress(block);
        }
        Ok(failed)
    }

    /// Write counters accumulated since the handle was opened
    pub fn stats(&self) -> MergeStats {
        self.device.stats()
    }

    /// Blocks left unusable by a failed program, awaiting an erase
    pub fn poisoned_blocks(&self) -> Vec<u32> {
        self.device.context().poisoned_blocks().collect()
    }

    /// Get mutable reference to the underlying block device
    pub fn as_device_mut(&mut self) -> &mut dyn BlockDevice {
        &mut self.device
    }

    /// Persist backend state without closing
    pub fn sync(&mut self) -> Result<(), DeviceError> {
        self.device.controller_mut().sync()
    }

    /// Close the device and persist backend state
    pub fn close(mut self) -> Result<(), DeviceError> {
        self.device.close()?;
        self.sync()
    }
}
