//! Protocol implementations
//!
//! This module contains the parallel NAND command sequences: chip select
//! and reset, identification, page read, page program with verify and
//! block erase.

mod nand;
pub mod opcodes;

pub use nand::*;
