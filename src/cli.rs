//! CLI argument parsing

use clap::{Parser, Subcommand};
use nandflash_core::config::EccMode;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse an ECC strength ("16", "24-bit", ...)
fn parse_ecc(s: &str) -> Result<EccMode, String> {
    s.parse()
        .map_err(|_| format!("Invalid ECC strength '{}' (expected 16, 24 or 30)", s))
}

/// Generate dynamic help text for the controller argument
fn controller_help() -> String {
    format!(
        "Controller to use [available: {}]",
        nandflash_device::controller_names_short()
    )
}

#[derive(Parser)]
#[command(name = "nandflash")]
#[command(author, version, about = "Raw NAND flash driver debug tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to chip database directory or file (.ron)
    /// Defaults to looking in ./chips/ and /usr/share/nandflash/chips/
    #[arg(long, global = true)]
    pub chip_db: Option<PathBuf>,

    /// Controller bus clock in Hz
    #[arg(long, global = true, value_parser = parse_hex_u32)]
    pub bus_clk: Option<u32>,

    /// Never select an ECC mode stronger than this (16, 24 or 30)
    #[arg(long, global = true, value_parser = parse_ecc)]
    pub max_ecc: Option<EccMode>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Controller selection shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct ControllerArgs {
    /// Controller to use
    #[arg(short, long, default_value = "sim", help = controller_help())]
    pub controller: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bring the controller up and identify the chip
    Probe {
        #[command(flatten)]
        ctrl: ControllerArgs,
    },

    /// Show chip and controller configuration
    Info {
        #[command(flatten)]
        ctrl: ControllerArgs,
    },

    /// Read sectors (pages) to a file
    Read {
        #[command(flatten)]
        ctrl: ControllerArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// First sector to read
        #[arg(long, default_value = "0", value_parser = parse_hex_u32)]
        start: u32,

        /// Number of sectors to read (default: to the end of the chip)
        #[arg(long, value_parser = parse_hex_u32)]
        count: Option<u32>,
    },

    /// Write a file to sectors (pages), merging blocks as needed
    Write {
        #[command(flatten)]
        ctrl: ControllerArgs,

        /// Input file path (padded with 0xFF to a whole page)
        #[arg(short, long)]
        input: PathBuf,

        /// First sector to write
        #[arg(long, default_value = "0", value_parser = parse_hex_u32)]
        start: u32,
    },

    /// Read one page and dump its data and spare area
    ReadPage {
        #[command(flatten)]
        ctrl: ControllerArgs,

        /// Block number
        #[arg(value_parser = parse_hex_u32)]
        block: u32,

        /// Page within the block
        #[arg(value_parser = parse_hex_u32)]
        page: u32,

        /// Dump the whole page instead of the first 64 bytes
        #[arg(long)]
        full: bool,
    },

    /// Program one erased page with a test pattern or file contents
    WritePage {
        #[command(flatten)]
        ctrl: ControllerArgs,

        /// Block number
        #[arg(value_parser = parse_hex_u32)]
        block: u32,

        /// Page within the block
        #[arg(value_parser = parse_hex_u32)]
        page: u32,

        /// Data file (default: incrementing byte pattern)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Erase one block
    EraseBlock {
        #[command(flatten)]
        ctrl: ControllerArgs,

        /// Block number
        #[arg(value_parser = parse_hex_u32)]
        block: u32,
    },

    /// Read and dump one page's spare area
    ReadOob {
        #[command(flatten)]
        ctrl: ControllerArgs,

        /// Block number
        #[arg(value_parser = parse_hex_u32)]
        block: u32,

        /// Page within the block
        #[arg(value_parser = parse_hex_u32)]
        page: u32,
    },

    /// Erase every block of the chip
    EraseChip {
        #[command(flatten)]
        ctrl: ControllerArgs,
    },

    /// List available controllers
    ListControllers,

    /// List supported chips
    ListChips {
        /// Filter by vendor
        #[arg(long)]
        vendor: Option<String>,
    },
}
