//! Error types for nandflash-core
//!
//! This module provides a no_std compatible error type shared by every
//! layer of the driver. All failures are returned as values; nothing in the
//! driver panics on a hardware fault.

use core::fmt;

use crate::flash::PageAddr;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Initialization errors
    /// Chip did not report ready after select or reset
    InitTimeout,
    /// Identification bytes do not match the expected chip
    UnrecognizedDevice,
    /// No ECC mode fits the page/spare geometry
    UnsupportedEccGeometry,
    /// Datasheet timing cannot be expressed at this bus clock
    UnsupportedTiming,
    /// Page size, chip-select count or address cycles not supported by the controller
    UnsupportedGeometry,
    /// No chip in the database matches
    ChipNotFound,

    // Operation errors
    /// Program command reported failure in the status byte
    ProgramFailure(PageAddr),
    /// Read-back after program differs from the programmed bytes
    VerifyMismatch {
        /// Page that failed verification
        page: PageAddr,
        /// Byte offset of the first difference (data region first, then OOB)
        offset: usize,
    },
    /// Erase command reported failure in the status byte
    EraseFailure {
        /// Block that failed to erase
        block: u32,
    },
    /// Chip stayed busy past the poll limit during program or erase
    Timeout,
    /// Block holds a failed program and must be erased before reuse
    BlockNeedsErase {
        /// Block waiting for an erase
        block: u32,
    },

    // Address/size errors
    /// Address is beyond the chip geometry
    AddressOutOfBounds,
    /// Provided buffer is too small for the operation
    BufferTooSmall,
    /// Data length is not a whole number of pages
    InvalidAlignment,

    // Device errors
    /// Block device used before `open`
    NotOpen,
    /// Control command not implemented by this device
    NotSupported,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitTimeout => write!(f, "NAND chip did not become ready"),
            Self::UnrecognizedDevice => write!(f, "unrecognized NAND device ID"),
            Self::UnsupportedEccGeometry => {
                write!(f, "no ECC mode fits the page/spare geometry")
            }
            Self::UnsupportedTiming => {
                write!(f, "chip timing not supported at this bus clock")
            }
            Self::UnsupportedGeometry => write!(f, "chip geometry not supported by controller"),
            Self::ChipNotFound => write!(f, "NAND chip not found in database"),
            Self::ProgramFailure(addr) => write!(f, "program failed at {}", addr),
            Self::VerifyMismatch { page, offset } => {
                write!(f, "verify failed at {} offset {}", page, offset)
            }
            Self::EraseFailure { block } => write!(f, "erase failed at block {}", block),
            Self::Timeout => write!(f, "operation timed out"),
            Self::BlockNeedsErase { block } => {
                write!(f, "block {} must be erased after a failed program", block)
            }
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::InvalidAlignment => write!(f, "length is not a whole number of pages"),
            Self::NotOpen => write!(f, "device not open"),
            Self::NotSupported => write!(f, "control command not supported"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
