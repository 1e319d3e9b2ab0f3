//! CLI command implementations
//!
//! All commands take an open `DeviceHandle`.
//!
//! ## Sector commands
//!
//! `read` and `write` go through the block device: positions are sectors
//! (one per page) and writes are merged into already-programmed blocks.
//!
//! ## Page commands
//!
//! The debug commands (`read-page`, `write-page`, `erase-block`, `read-oob`,
//! `erase-chip`) call the page primitives directly. `write-page` does not
//! merge; the page must be erased.

mod dump;
mod list;
mod page;
mod probe;
mod transfer;

pub use list::{list_chips, list_controllers};
pub use page::{run_erase_chip, run_read_oob, run_read_page, run_write_page};
pub use probe::{print_chip_info, run_probe};
pub use transfer::{run_read, run_write};
