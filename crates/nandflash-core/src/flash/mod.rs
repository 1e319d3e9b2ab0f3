//! High-level NAND operations
//!
//! This module provides the runtime context shared by the primitives, the
//! block-merge writer that emulates overwrite on erase-before-write media,
//! and the block device adapter built on top of both.

mod context;
mod device;
mod merge;
mod nand_device;

pub use context::*;
pub use device::*;
pub use merge::*;
pub use nand_device::*;
