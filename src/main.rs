//! nandflash - Raw NAND flash driver debug tool
//!
//! Brings a NAND controller up the way the board driver does (timing and
//! ECC derived from the chip descriptor, reset, ID check) and exposes the
//! block device and the page-level primitives from the command line.
//!
//! # Architecture
//!
//! All commands go through a `DeviceHandle` from `nandflash-device`:
//! - **Sector commands** (read, write) use the block device, so writes get
//!   the same read-merge-erase-program treatment as on the target
//! - **Page commands** (read-page, write-page, erase-block, read-oob,
//!   erase-chip) call the primitives directly, like the board's debug shell
//!
//! The `sim` controller keeps the chip in memory; with `image=<path>` its
//! contents survive between runs.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use nandflash_core::chip::ChipDatabase;
use nandflash_core::config::{DriverOptions, EccPolicy};
use nandflash_device::{open_nand, DeviceHandle};
use std::path::{Path, PathBuf};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    // Load chip database
    let db = match load_chip_database(cli.chip_db.as_deref()) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to load chip database: {}", e);
            std::process::exit(1);
        }
    };

    log::debug!("Loaded {} chip definitions", db.len());

    let opts = driver_options(&cli);
    let open = |controller: &str| -> Result<DeviceHandle, Box<dyn std::error::Error>> {
        Ok(open_nand(controller, &db, &opts)?)
    };

    match cli.command {
        Commands::Probe { ctrl } => {
            let mut handle = open(&ctrl.controller)?;
            commands::run_probe(&mut handle)?;
            handle.close()?;
            Ok(())
        }
        Commands::Info { ctrl } => {
            let handle = open(&ctrl.controller)?;
            commands::print_chip_info(&handle);
            handle.close()?;
            Ok(())
        }
        Commands::Read {
            ctrl,
            output,
            start,
            count,
        } => {
            let mut handle = open(&ctrl.controller)?;
            commands::run_read(&mut handle, &output, start, count)?;
            handle.close()?;
            Ok(())
        }
        Commands::Write { ctrl, input, start } => {
            let mut handle = open(&ctrl.controller)?;
            commands::run_write(&mut handle, &input, start)?;
            handle.close()?;
            Ok(())
        }
        Commands::ReadPage {
            ctrl,
            block,
            page,
            full,
        } => {
            let mut handle = open(&ctrl.controller)?;
            commands::run_read_page(&mut handle, block, page, full)?;
            handle.close()?;
            Ok(())
        }
        Commands::WritePage {
            ctrl,
            block,
            page,
            input,
        } => {
            let mut handle = open(&ctrl.controller)?;
            commands::run_write_page(&mut handle, block, page, input.as_deref())?;
            handle.close()?;
            Ok(())
        }
        Commands::EraseBlock { ctrl, block } => {
            let mut handle = open(&ctrl.controller)?;
            handle.erase_block(block)?;
            println!("Erased block {}", block);
            handle.close()?;
            Ok(())
        }
        Commands::ReadOob { ctrl, block, page } => {
            let mut handle = open(&ctrl.controller)?;
            commands::run_read_oob(&mut handle, block, page)?;
            handle.close()?;
            Ok(())
        }
        Commands::EraseChip { ctrl } => {
            let mut handle = open(&ctrl.controller)?;
            commands::run_erase_chip(&mut handle)?;
            handle.close()?;
            Ok(())
        }
        Commands::ListControllers => {
            commands::list_controllers();
            Ok(())
        }
        Commands::ListChips { vendor } => {
            commands::list_chips(&db, vendor.as_deref());
            Ok(())
        }
    }
}

/// Driver options from the global arguments
fn driver_options(cli: &Cli) -> DriverOptions {
    let mut opts = DriverOptions::default();
    if let Some(hz) = cli.bus_clk {
        opts.bus_clk_hz = hz;
    }
    if let Some(mode) = cli.max_ecc {
        opts.ecc_policy = EccPolicy::capped(mode);
    }
    opts
}

/// Load the chip database: builtin chips plus the specified path or default locations
fn load_chip_database(path: Option<&Path>) -> Result<ChipDatabase, Box<dyn std::error::Error>> {
    let mut db = ChipDatabase::with_builtin();

    if let Some(path) = path {
        // User specified a path
        if path.is_dir() {
            db.load_dir(path)?;
        } else if path.is_file() {
            db.load_file(path)?;
        } else {
            return Err(format!("Chip database path not found: {}", path.display()).into());
        }
    } else {
        // Try default locations
        let default_paths = [
            PathBuf::from("chips"),
            PathBuf::from("/usr/share/nandflash/chips"),
            PathBuf::from("/usr/local/share/nandflash/chips"),
        ];

        for dir in &default_paths {
            if dir.is_dir() {
                match db.load_dir(dir) {
                    Ok(count) => {
                        log::debug!("Loaded {} chips from {}", count, dir.display());
                    }
                    Err(e) => {
                        log::warn!("Failed to load chips from {}: {}", dir.display(), e);
                    }
                }
            }
        }
    }

    Ok(db)
}
