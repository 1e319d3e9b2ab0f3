//! NAND chip types and database
//!
//! This module provides types for describing NAND chips (geometry,
//! datasheet timing, bus wiring) as well as a database of known chips.

mod database;
mod types;

pub use database::*;
pub use types::*;
