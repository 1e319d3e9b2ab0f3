//! NAND controller access
//!
//! The driver never touches memory-mapped registers directly. Everything
//! goes through the [`NandController`] trait, which a board provides (see
//! [`MmioController`]) and which the emulator implements for tests.

mod mmio;
mod traits;

pub use mmio::*;
pub use traits::*;
