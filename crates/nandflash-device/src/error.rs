//! Error types for device opening and registration

use nandflash_core::chip::ChipDbError;
use nandflash_core::flash::OpenFlags;
use thiserror::Error;

/// Errors from opening, registering or using a NAND device
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Driver-level failure
    #[error(transparent)]
    Flash(#[from] nandflash_core::Error),

    /// Emulator image could not be loaded or saved
    #[cfg(feature = "sim")]
    #[error("simulator: {0}")]
    Sim(#[from] nandflash_sim::SimError),

    /// Chip database could not be loaded
    #[error("chip database: {0}")]
    ChipDb(#[from] ChipDbError),

    /// Controller parameter without `=`
    #[error("invalid parameter format: '{0}' (expected key=value)")]
    InvalidParameter(String),

    /// Controller parameter with a value that does not parse
    #[error("invalid value for '{key}': '{value}'")]
    InvalidValue {
        /// Parameter name
        key: String,
        /// Offending value
        value: String,
    },

    /// No controller backend with this name
    #[error("unknown controller: {0}")]
    UnknownController(String),

    /// Chip name not in the database
    #[error("unknown chip: {0}")]
    UnknownChip(String),

    /// A device with this name is already registered
    #[error("device '{0}' is already registered")]
    AlreadyRegistered(String),

    /// No device with this name is registered
    #[error("no device named '{0}'")]
    NoSuchDevice(String),

    /// Device was registered without the requested access
    #[error("device '{name}' does not allow {requested:?}")]
    AccessDenied {
        /// Device name
        name: String,
        /// Flags asked for
        requested: OpenFlags,
    },
}
