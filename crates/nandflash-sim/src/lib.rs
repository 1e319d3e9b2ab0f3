//! nandflash-sim - In-memory NAND chip and controller emulator
//!
//! This crate provides a [`SimController`] that implements
//! [`NandController`] and behaves like a NAND controller with one chip
//! attached. It decodes the same command/address/data sequences the driver
//! issues, stores pages sparsely in memory, and can inject program, verify
//! and erase failures. It backs the test suite and the `sim` controller of
//! the command-line tool.
//!
//! Programming follows NAND rules: bits only go from 1 to 0, and a page
//! programmed twice without an erase is counted as a violation.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(feature = "std")]
mod error;
#[cfg(feature = "std")]
mod image;

#[cfg(feature = "std")]
pub use error::SimError;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use nandflash_core::chip::{ChipDescriptor, ChipGeometry, NandTiming, ID_READ_LEN};
use nandflash_core::controller::{NandController, Register};
use nandflash_core::flash::PageAddr;
use nandflash_core::protocol::opcodes;

/// Configuration of the emulated chip
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Bytes returned by READ ID (zero padded)
    pub id: [u8; ID_READ_LEN],
    /// Chip geometry
    pub geometry: ChipGeometry,
    /// Bitmask of chip selects that report ready
    pub present: u8,
}

impl SimConfig {
    /// Emulate the chip a descriptor describes
    pub fn from_descriptor(chip: &ChipDescriptor) -> Self {
        let mut id = [0u8; ID_READ_LEN];
        for (dst, src) in id.iter_mut().zip(chip.id.iter()) {
            *dst = *src;
        }
        Self {
            id,
            geometry: chip.geometry,
            present: 0x1,
        }
    }

    /// Descriptor for a small 2 KiB-page chip, quick to exercise in tests
    ///
    /// 64 blocks of 16 pages, 64 spare bytes per page.
    pub fn small_chip() -> ChipDescriptor {
        let mut chip = ChipDescriptor::hynix_h27ubg8t2a();
        chip.vendor = "Sim".into();
        chip.name = "SIM2K".into();
        chip.id = heapless::Vec::from_slice(&[0x98, 0xa1, 0x00, 0x15, 0x00, 0x00])
            .unwrap_or_default();
        chip.geometry = ChipGeometry {
            block_count: 64,
            pages_per_block: 16,
            page_size: 2048,
            spare_size: 64,
            col_cycles: 2,
            row_cycles: 3,
            timing: NandTiming {
                t_cls: 12,
                t_als: 12,
                t_wc: 25,
                t_wp: 12,
                t_wh: 10,
                t_rc: 25,
                t_rp: 12,
                t_reh: 10,
            },
        };
        chip
    }
}

/// Injected fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Next program of this page reports failure and stores nothing
    FailProgram(PageAddr),
    /// Next program of this page succeeds but stores a flipped bit
    CorruptProgram(PageAddr),
    /// Next erase of this block reports failure and erases nothing
    FailErase(u32),
    /// The chip never reports ready in its status byte
    StuckBusy,
    /// The controller never reports this chip select ready
    NeverReady(u8),
}

impl Fault {
    fn one_shot(&self) -> bool {
        matches!(
            self,
            Fault::FailProgram(_) | Fault::CorruptProgram(_) | Fault::FailErase(_)
        )
    }
}

/// Operation counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimStats {
    /// Page reads started (READSTART)
    pub reads: u64,
    /// Page programs (PAGEPROG)
    pub programs: u64,
    /// Block erases (ERASE2)
    pub erases: u64,
    /// Resets
    pub resets: u64,
    /// Programs of a page that already held data
    pub double_programs: u64,
    /// Commands the emulator does not know
    pub unknown_commands: u64,
    /// Total requested delay in microseconds
    pub delay_us: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Idle,
    Status,
    ReadId { pos: usize },
    ReadSetup { oob_only: bool },
    ReadOut { row: u32, pos: usize },
    ProgramIn,
    EraseSetup,
}

/// Emulated NAND controller with one chip attached
pub struct SimController {
    config: SimConfig,
    pages: BTreeMap<u32, Box<[u8]>>,
    mode: Mode,
    addr: Vec<u8>,
    input: Vec<u8>,
    last_failed: bool,
    faults: Vec<Fault>,
    config_reg: u32,
    control_reg: u32,
    stats: SimStats,
}

impl SimController {
    /// Create an emulator with every page erased
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            pages: BTreeMap::new(),
            mode: Mode::Idle,
            addr: Vec::new(),
            input: Vec::new(),
            last_failed: false,
            faults: Vec::new(),
            config_reg: 0,
            control_reg: 0,
            stats: SimStats::default(),
        }
    }

    /// Create an emulator for a chip descriptor
    pub fn from_descriptor(chip: &ChipDescriptor) -> Self {
        Self::new(SimConfig::from_descriptor(chip))
    }

    /// Emulator configuration
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Operation counters
    pub fn stats(&self) -> SimStats {
        self.stats
    }

    /// Last value written to the configuration register
    pub fn config_register(&self) -> u32 {
        self.config_reg
    }

    /// Last value written to the control register
    pub fn control_register(&self) -> u32 {
        self.control_reg
    }

    /// Inject a fault
    pub fn inject(&mut self, fault: Fault) {
        log::debug!("Injecting fault {:?}", fault);
        self.faults.push(fault);
    }

    /// Remove every injected fault
    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    /// Number of pages holding data
    pub fn programmed_pages(&self) -> usize {
        self.pages.len()
    }

    /// Raw contents (data + spare) of a page, `None` when erased
    pub fn page(&self, addr: PageAddr) -> Option<&[u8]> {
        self.pages.get(&self.row_of(addr)).map(|p| &p[..])
    }

    /// Whether a page is erased
    pub fn is_erased(&self, addr: PageAddr) -> bool {
        !self.pages.contains_key(&self.row_of(addr))
    }

    /// Store raw page contents directly, bypassing the bus
    ///
    /// `raw` is data followed by spare bytes; missing bytes read as 0xFF.
    pub fn load_page(&mut self, addr: PageAddr, raw: &[u8]) {
        let row = self.row_of(addr);
        let mut page = vec![0xff; self.raw_page_size()].into_boxed_slice();
        let len = raw.len().min(page.len());
        page[..len].copy_from_slice(&raw[..len]);
        self.store_page(row, page);
    }

    fn raw_page_size(&self) -> usize {
        self.config.geometry.raw_page_size()
    }

    fn total_pages(&self) -> u64 {
        self.config.geometry.total_pages()
    }

    fn row_of(&self, addr: PageAddr) -> u32 {
        addr.block * self.config.geometry.pages_per_block + addr.page
    }

    fn addr_of(&self, row: u32) -> PageAddr {
        let ppb = self.config.geometry.pages_per_block;
        PageAddr::new(row / ppb, row % ppb)
    }

    fn store_page(&mut self, row: u32, page: Box<[u8]>) {
        if page.iter().all(|&b| b == 0xff) {
            self.pages.remove(&row);
        } else {
            self.pages.insert(row, page);
        }
    }

    fn has_fault(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }

    /// Consume a one-shot fault if present
    fn take_fault(&mut self, fault: Fault) -> bool {
        match self.faults.iter().position(|f| *f == fault) {
            Some(i) => {
                if fault.one_shot() {
                    self.faults.remove(i);
                }
                true
            }
            None => false,
        }
    }

    fn selected_cs(&self) -> u8 {
        ((self.config_reg >> 25) & 0x3) as u8
    }

    fn decode_row(&self, skip_columns: bool) -> Option<u32> {
        let geom = &self.config.geometry;
        let skip = if skip_columns {
            geom.col_cycles as usize
        } else {
            0
        };
        let cycles = self.addr.get(skip..skip + geom.row_cycles as usize)?;
        let row = cycles
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, &b)| acc | (b as u32) << (8 * i));
        ((row as u64) < self.total_pages()).then_some(row)
    }

    fn decode_column(&self) -> usize {
        let cycles = self.config.geometry.col_cycles as usize;
        self.addr
            .iter()
            .take(cycles)
            .enumerate()
            .fold(0usize, |acc, (i, &b)| acc | (b as usize) << (8 * i))
    }

    fn status_byte(&self) -> u8 {
        let mut status = 0;
        if !self.has_fault(Fault::StuckBusy) {
            status |= opcodes::STATUS_READY;
        }
        if self.last_failed {
            status |= opcodes::STATUS_FAIL;
        }
        status
    }

    fn handle_command(&mut self, cmd: u8) {
        match cmd {
            opcodes::RESET => {
                self.stats.resets += 1;
                self.mode = Mode::Idle;
                self.last_failed = false;
                self.input.clear();
                self.addr.clear();
            }
            opcodes::STATUS => self.mode = Mode::Status,
            opcodes::READID => {
                self.addr.clear();
                self.mode = Mode::ReadId { pos: 0 };
            }
            opcodes::READ0 | opcodes::READOOB => {
                self.addr.clear();
                self.mode = Mode::ReadSetup {
                    oob_only: cmd == opcodes::READOOB,
                };
            }
            opcodes::READSTART => self.start_read(),
            opcodes::SEQIN => {
                self.addr.clear();
                self.input.clear();
                self.mode = Mode::ProgramIn;
            }
            opcodes::PAGEPROG => self.program(),
            opcodes::ERASE1 => {
                self.addr.clear();
                self.mode = Mode::EraseSetup;
            }
            opcodes::ERASE2 => self.erase(),
            other => {
                log::warn!("Sim: unknown command {:#04x}", other);
                self.stats.unknown_commands += 1;
                self.mode = Mode::Idle;
            }
        }
    }

    fn start_read(&mut self) {
        let Mode::ReadSetup { oob_only } = self.mode else {
            log::warn!("Sim: READSTART without read setup");
            self.mode = Mode::Idle;
            return;
        };
        let Some(row) = self.decode_row(true) else {
            log::warn!("Sim: read address out of range");
            self.mode = Mode::Idle;
            return;
        };
        let column = self.decode_column();
        let pos = if oob_only {
            self.config.geometry.page_size as usize + column
        } else {
            column
        };
        self.stats.reads += 1;
        log::trace!("Sim: read {} from byte {}", self.addr_of(row), pos);
        self.mode = Mode::ReadOut { row, pos };
    }

    fn program(&mut self) {
        self.mode = Mode::Idle;
        self.stats.programs += 1;
        let Some(row) = self.decode_row(true) else {
            log::warn!("Sim: program address out of range");
            self.last_failed = true;
            return;
        };
        let addr = self.addr_of(row);

        if self.take_fault(Fault::FailProgram(addr)) {
            log::debug!("Sim: failing program of {}", addr);
            self.last_failed = true;
            return;
        }

        let raw_len = self.raw_page_size();
        let column = self.decode_column().min(raw_len);
        let mut page = match self.pages.get(&row) {
            Some(existing) => {
                self.stats.double_programs += 1;
                log::warn!("Sim: {} programmed twice without erase", addr);
                existing.clone()
            }
            None => vec![0xff; raw_len].into_boxed_slice(),
        };
        for (dst, src) in page[column..].iter_mut().zip(self.input.iter()) {
            *dst &= *src;
        }
        if self.take_fault(Fault::CorruptProgram(addr)) {
            log::debug!("Sim: corrupting program of {}", addr);
            page[0] ^= 0x01;
        }
        self.store_page(row, page);
        self.last_failed = false;
    }

    fn erase(&mut self) {
        self.mode = Mode::Idle;
        self.stats.erases += 1;
        let Some(row) = self.decode_row(false) else {
            log::warn!("Sim: erase address out of range");
            self.last_failed = true;
            return;
        };
        let ppb = self.config.geometry.pages_per_block;
        let block = row / ppb;

        if self.take_fault(Fault::FailErase(block)) {
            log::debug!("Sim: failing erase of block {}", block);
            self.last_failed = true;
            return;
        }

        let first = block * ppb;
        let doomed: Vec<u32> = self.pages.range(first..first + ppb).map(|(r, _)| *r).collect();
        for r in doomed {
            self.pages.remove(&r);
        }
        self.last_failed = false;
    }

    fn data_out(&mut self) -> u8 {
        if self.mode == Mode::Status {
            return self.status_byte();
        }
        match &mut self.mode {
            Mode::ReadId { pos } => {
                let byte = self.config.id.get(*pos).copied().unwrap_or(0);
                *pos += 1;
                byte
            }
            Mode::ReadOut { row, pos } => {
                let byte = self
                    .pages
                    .get(&*row)
                    .and_then(|p| p.get(*pos).copied())
                    .unwrap_or(0xff);
                *pos += 1;
                byte
            }
            _ => 0xff,
        }
    }
}

impl NandController for SimController {
    fn read_reg(&mut self, reg: Register) -> u32 {
        match reg {
            Register::Config => self.config_reg,
            Register::Control => self.control_reg,
            Register::Status => {
                let mut ready = self.config.present as u32;
                for cs in 0..4u8 {
                    if self.has_fault(Fault::NeverReady(cs)) {
                        ready &= !(1 << cs);
                    }
                }
                ready
            }
            Register::Data => self.data_out() as u32,
            Register::Command | Register::Address => 0,
        }
    }

    fn write_reg(&mut self, reg: Register, value: u32) {
        match reg {
            Register::Config => self.config_reg = value,
            Register::Control => self.control_reg = value,
            Register::Command => self.handle_command(value as u8),
            Register::Address => self.addr.push(value as u8),
            Register::Data => {
                if self.mode == Mode::ProgramIn {
                    self.input.push(value as u8);
                }
            }
            Register::Status => {}
        }
    }

    fn delay_us(&mut self, us: u32) {
        self.stats.delay_us += us as u64;
    }

    fn read_data(&mut self, buf: &mut [u8]) {
        if let Mode::ReadOut { row, pos } = &mut self.mode {
            let page = self.pages.get(&*row);
            for byte in buf.iter_mut() {
                *byte = page.and_then(|p| p.get(*pos).copied()).unwrap_or(0xff);
                *pos += 1;
            }
        } else {
            for byte in buf.iter_mut() {
                *byte = self.data_out();
            }
        }
    }

    fn write_data(&mut self, data: &[u8]) {
        if self.mode == Mode::ProgramIn {
            self.input.extend_from_slice(data);
        }
    }

    fn skip_data(&mut self, len: usize) {
        if let Mode::ReadOut { pos, .. } = &mut self.mode {
            *pos += len;
        } else {
            for _ in 0..len {
                self.data_out();
            }
        }
    }

    fn fill_data(&mut self, value: u8, len: usize) {
        if self.mode == Mode::ProgramIn {
            self.input.resize(self.input.len() + len, value);
        }
    }
}

impl core::fmt::Debug for SimController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimController")
            .field("programmed_pages", &self.pages.len())
            .field("selected_cs", &self.selected_cs())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests;
