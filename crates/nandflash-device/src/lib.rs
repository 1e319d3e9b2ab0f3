//! Device opening and registration for nandflash
//!
//! This crate sits between the driver core and its users. It turns a
//! controller string such as `sim:chip=H27UBG8T2A,image=nand.img` into a
//! ready [`DeviceHandle`], and provides the named [`DeviceRegistry`] the
//! NAND block device is registered into.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CLI (bin/nandflash)                     │
//! │  - Only imports nandflash-device and nandflash-core (chips) │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 nandflash-device (this crate)                │
//! │  - DeviceHandle: NAND device + chip information              │
//! │  - DeviceRegistry / register_nand: named block devices       │
//! │  - open_nand: controller strings to handles                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │    nandflash-core        │   │  Controller backends     │
//! │  - NandDevice            │   │  - nandflash-sim         │
//! │  - Page primitives       │   │  - MmioController (core) │
//! │  - Chip database         │   │                          │
//! └──────────────────────────┘   └──────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use nandflash_core::chip::ChipDatabase;
//! use nandflash_core::config::DriverOptions;
//! use nandflash_device::open_nand;
//!
//! let db = ChipDatabase::with_builtin();
//! let mut handle = open_nand("sim", &db, &DriverOptions::default())?;
//!
//! let mut page = vec![0u8; handle.chip_info().page_size as usize];
//! handle.read(0, &mut page)?;
//! ```

mod error;
mod handle;
mod registry;

pub use error::DeviceError;
pub use handle::{Backend, BoxedBackend, ChipInfo, DeviceHandle};
pub use registry::{
    available_controllers, controller_names_short, open_nand, parse_controller_params,
    register_nand, ControllerInfo, ControllerParams, DeviceRegistry, DEFAULT_CHIP,
    NAND_DEVICE_NAME,
};

#[cfg(feature = "sim")]
pub use handle::SimBackend;

// Re-export core types that the CLI needs
pub use nandflash_core::flash::{BlockDevice, BlockGeometry, MergeStats, OpenFlags, PageAddr};
