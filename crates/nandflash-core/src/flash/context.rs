//! Flash context - runtime state for NAND operations

use alloc::collections::{BTreeMap, BTreeSet};
use core::fmt;

use crate::chip::{ChipDescriptor, ChipGeometry};
use crate::config::{ControllerConfig, DriverOptions, PollLimits};
use crate::error::{Error, Result};

/// Physical page address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PageAddr {
    /// Erase block index
    pub block: u32,
    /// Page index within the block
    pub page: u32,
}

impl PageAddr {
    /// Create a page address
    pub const fn new(block: u32, page: u32) -> Self {
        Self { block, page }
    }
}

impl fmt::Display for PageAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {} page {}", self.block, self.page)
    }
}

/// Runtime context for NAND operations
///
/// Holds the chip being driven, the derived controller configuration and
/// the little mutable state the primitives share: the live configuration
/// register image and the blocks left unusable by a failed program, with
/// the pages whose program failed.
#[derive(Debug, Clone)]
pub struct NandContext {
    /// The chip being driven
    pub chip: ChipDescriptor,
    /// Derived controller configuration
    pub config: ControllerConfig,
    /// Poll limits for every busy-wait
    pub limits: PollLimits,
    cfg_image: u32,
    selected: Option<u8>,
    poisoned: BTreeMap<u32, BTreeSet<u32>>,
}

impl NandContext {
    /// Derive the controller configuration and build a context for `chip`
    pub fn new(chip: ChipDescriptor, opts: &DriverOptions) -> Result<Self> {
        let config = ControllerConfig::from_descriptor(&chip, opts)?;
        let cfg_image = config.register_image(0);
        Ok(Self {
            chip,
            config,
            limits: opts.limits,
            cfg_image,
            selected: None,
            poisoned: BTreeMap::new(),
        })
    }

    /// Chip geometry
    pub fn geometry(&self) -> &ChipGeometry {
        &self.chip.geometry
    }

    /// Data bytes per page
    pub fn page_size(&self) -> usize {
        self.chip.geometry.page_size as usize
    }

    /// Spare bytes per page
    pub fn spare_size(&self) -> usize {
        self.chip.geometry.spare_size as usize
    }

    /// Pages per erase block
    pub fn pages_per_block(&self) -> u32 {
        self.chip.geometry.pages_per_block
    }

    /// Current configuration register value
    pub fn cfg_image(&self) -> u32 {
        self.cfg_image
    }

    /// Currently selected chip, if any
    pub fn selected(&self) -> Option<u8> {
        self.selected
    }

    /// Update the chip-select field of the register image
    ///
    /// Returns the new register value.
    pub(crate) fn set_chip_select(&mut self, cs: u8) -> u32 {
        self.cfg_image = self.config.register_image(cs);
        self.selected = Some(cs);
        self.cfg_image
    }

    /// Check that a block index is within the chip
    pub fn check_block(&self, block: u32) -> Result<()> {
        if block < self.chip.geometry.block_count {
            Ok(())
        } else {
            Err(Error::AddressOutOfBounds)
        }
    }

    /// Linear row address of a page
    pub fn row_address(&self, addr: PageAddr) -> Result<u32> {
        self.check_block(addr.block)?;
        if addr.page >= self.pages_per_block() {
            return Err(Error::AddressOutOfBounds);
        }
        Ok(addr.block * self.pages_per_block() + addr.page)
    }

    /// Whether a failed program left the block unusable until erased
    pub fn is_poisoned(&self, block: u32) -> bool {
        self.poisoned.contains_key(&block)
    }

    /// Whether the last program of this page failed
    ///
    /// Such a page may carry a written marker over garbage; its contents
    /// must not be carried across an erase.
    pub fn page_failed(&self, addr: PageAddr) -> bool {
        self.poisoned
            .get(&addr.block)
            .is_some_and(|pages| pages.contains(&addr.page))
    }

    /// Blocks awaiting an erase after a failed program
    pub fn poisoned_blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.poisoned.keys().copied()
    }

    /// Record a failed program of `addr`, poisoning its block
    pub(crate) fn poison(&mut self, addr: PageAddr) {
        let pages = self.poisoned.entry(addr.block).or_default();
        if pages.is_empty() {
            log::warn!("Block {} marked as needing erase", addr.block);
        }
        pages.insert(addr.page);
    }

    pub(crate) fn clear_poison(&mut self, block: u32) {
        self.poisoned.remove(&block);
    }
}
