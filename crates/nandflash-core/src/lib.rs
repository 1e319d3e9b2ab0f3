//! nandflash-core - Core library for raw parallel NAND flash access
//!
//! This crate provides the flash access engine of a raw-media NAND driver:
//! controller timing/ECC configuration derived from chip datasheet values,
//! the primitive command sequences (reset, read ID, read page, program page
//! with verify, erase block) and a block device adapter that emulates
//! arbitrary-offset overwrite on top of block-granular erase.
//!
//! It is `no_std` (with `alloc`) so it can run on the target board. The
//! `std` feature adds RON chip database loading and `std::error::Error`.
//!
//! # Example
//!
//! ```ignore
//! use nandflash_core::chip::ChipDatabase;
//! use nandflash_core::config::DriverOptions;
//! use nandflash_core::controller::NandController;
//! use nandflash_core::flash::{BlockDevice, NandContext, NandDevice, OpenFlags};
//!
//! fn bring_up<C: NandController>(ctrl: C) -> nandflash_core::Result<()> {
//!     let db = ChipDatabase::with_builtin();
//!     let chip = db.find_by_name("H27UBG8T2A").unwrap().clone();
//!     let ctx = NandContext::new(chip, &DriverOptions::default())?;
//!     let mut dev = NandDevice::new(ctrl, ctx);
//!     dev.init()?;
//!     dev.open(OpenFlags::RDWR)?;
//!     let geometry = dev.geometry();
//!     println!("{} sectors of {} bytes", geometry.sector_count, geometry.bytes_per_sector);
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod chip;
pub mod config;
pub mod controller;
pub mod error;
pub mod flash;
pub mod protocol;

pub use error::{Error, Result};
