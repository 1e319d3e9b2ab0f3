//! Error types for the emulator

use thiserror::Error;

/// Errors from loading or saving emulator images
#[derive(Debug, Error)]
pub enum SimError {
    /// I/O error on the image file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File does not start with the image magic
    #[error("not a NAND simulator image")]
    BadMagic,

    /// Image was written for a different chip geometry
    #[error("image geometry {found} does not match chip geometry {expected}")]
    GeometryMismatch {
        /// Geometry of the emulated chip
        expected: String,
        /// Geometry recorded in the image
        found: String,
    },

    /// Image ends in the middle of a record
    #[error("image truncated")]
    Truncated,

    /// Image holds a page beyond the chip
    #[error("page {0} is beyond the end of the chip")]
    PageOutOfRange(u32),
}
