//! NAND block device
//!
//! Maps linear sector positions (one sector per page) onto block/page
//! addresses. Reads go straight to the page primitives; writes go through
//! the [`MergeWriter`].

use crate::chip::ID_READ_LEN;
use crate::controller::NandController;
use crate::error::{Error, Result};
use crate::flash::{
    BlockDevice, BlockGeometry, ControlCommand, ControlResponse, MergeStats, MergeWriter,
    NandContext, OpenFlags, PageAddr,
};
use crate::protocol;

/// Raw NAND chip exposed as a block device
pub struct NandDevice<C: NandController> {
    ctrl: C,
    ctx: NandContext,
    writer: MergeWriter,
    open: Option<OpenFlags>,
    stats: MergeStats,
}

impl<C: NandController> NandDevice<C> {
    /// Create a device; the staging buffer is allocated here
    pub fn new(ctrl: C, ctx: NandContext) -> Self {
        let writer = MergeWriter::new(&ctx);
        Self {
            ctrl,
            ctx,
            writer,
            open: None,
            stats: MergeStats::default(),
        }
    }

    /// Runtime context
    pub fn context(&self) -> &NandContext {
        &self.ctx
    }

    /// Underlying controller
    pub fn controller(&self) -> &C {
        &self.ctrl
    }

    /// Underlying controller, mutably
    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.ctrl
    }

    /// Split the device back into controller and context
    pub fn into_parts(self) -> (C, NandContext) {
        (self.ctrl, self.ctx)
    }

    /// Counters accumulated over every write since creation
    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    /// Whether the device is open
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Convert a sector position to a page address
    pub fn page_addr(&self, pos: u32) -> PageAddr {
        let ppb = self.ctx.pages_per_block();
        PageAddr::new(pos / ppb, pos % ppb)
    }

    /// Read and check the chip identification
    pub fn read_id(&mut self) -> Result<[u8; ID_READ_LEN]> {
        protocol::read_id(&mut self.ctrl, &mut self.ctx)
    }

    /// Read the chip status byte
    pub fn read_status(&mut self) -> u8 {
        protocol::read_status(&mut self.ctrl)
    }

    /// Reset a chip
    pub fn reset(&mut self, cs: u8) -> Result<()> {
        protocol::reset(&mut self.ctrl, &mut self.ctx, cs)
    }

    /// Read one page's data and/or spare area
    pub fn read_page(
        &mut self,
        addr: PageAddr,
        data: Option<&mut [u8]>,
        oob: Option<&mut [u8]>,
    ) -> Result<()> {
        protocol::read_page(&mut self.ctrl, &self.ctx, addr, data, oob)
    }

    /// Program one erased page
    ///
    /// No merge is attempted; the page must be erased.
    pub fn write_page(&mut self, addr: PageAddr, data: &[u8]) -> Result<()> {
        protocol::write_page(&mut self.ctrl, &mut self.ctx, addr, data)
    }

    /// Erase one block
    pub fn erase_block(&mut self, block: u32) -> Result<()> {
        protocol::erase_block(&mut self.ctrl, &mut self.ctx, block)
    }

    fn check_request(&self, pos: u32, buf_len: usize, count: usize) -> Result<()> {
        let sectors = self.geometry().sector_count as u64;
        if pos as u64 + count as u64 > sectors {
            return Err(Error::AddressOutOfBounds);
        }
        let needed = count
            .checked_mul(self.ctx.page_size())
            .ok_or(Error::AddressOutOfBounds)?;
        if buf_len < needed {
            return Err(Error::BufferTooSmall);
        }
        Ok(())
    }
}

impl<C: NandController> BlockDevice for NandDevice<C> {
    fn init(&mut self) -> Result<()> {
        protocol::init_controller(&mut self.ctrl, &mut self.ctx);
        protocol::reset(&mut self.ctrl, &mut self.ctx, 0)?;
        let id = protocol::read_id(&mut self.ctrl, &mut self.ctx)?;
        log::info!(
            "Found {} {} (ID {:02x?})",
            self.ctx.chip.vendor,
            self.ctx.chip.name,
            id
        );
        Ok(())
    }

    fn open(&mut self, flags: OpenFlags) -> Result<()> {
        self.open = Some(flags);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = None;
        Ok(())
    }

    fn read(&mut self, pos: u32, buf: &mut [u8], count: usize) -> Result<usize> {
        if !self.open.is_some_and(|f| f.contains(OpenFlags::RDONLY)) {
            return Err(Error::NotOpen);
        }
        self.check_request(pos, buf.len(), count)?;

        let ppb = self.ctx.pages_per_block();
        let ps = self.ctx.page_size();
        let mut addr = self.page_addr(pos);
        log::trace!("Read {} pages from {}", count, addr);

        for page_buf in buf.chunks_mut(ps).take(count) {
            protocol::read_page(&mut self.ctrl, &self.ctx, addr, Some(page_buf), None)?;
            addr.page += 1;
            if addr.page >= ppb {
                addr.block += 1;
                addr.page = 0;
            }
        }
        Ok(count)
    }

    fn write(&mut self, pos: u32, buf: &[u8], count: usize) -> Result<usize> {
        if !self.open.is_some_and(|f| f.contains(OpenFlags::WRONLY)) {
            return Err(Error::NotOpen);
        }
        self.check_request(pos, buf.len(), count)?;
        if count == 0 {
            return Ok(0);
        }

        let addr = self.page_addr(pos);
        let data = &buf[..count * self.ctx.page_size()];
        log::trace!("Write {} pages at {}", count, addr);

        let stats = self
            .writer
            .write(&mut self.ctrl, &mut self.ctx, addr, data)?;
        self.stats += stats;
        Ok(count)
    }

    fn control(&mut self, cmd: ControlCommand) -> Result<ControlResponse> {
        match cmd {
            ControlCommand::GetGeometry => Ok(ControlResponse::Geometry(self.geometry())),
            ControlCommand::Other(code) => {
                log::debug!("Unsupported control command {:#x}", code);
                Err(Error::NotSupported)
            }
        }
    }

    fn geometry(&self) -> BlockGeometry {
        let geom = self.ctx.geometry();
        BlockGeometry {
            bytes_per_sector: geom.page_size,
            block_size: geom.page_size * geom.pages_per_block,
            sector_count: geom.total_pages() as u32,
        }
    }
}
