//! Page-level debug commands implementation

use super::dump::{print_dump, SHORT_DUMP_LEN};
use indicatif::{ProgressBar, ProgressStyle};
use nandflash_device::{DeviceHandle, PageAddr};
use std::fs;
use std::path::Path;

/// Incrementing byte pattern used when no data file is given
pub fn test_pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| i as u8).collect()
}

/// Read one page and dump its data and spare area
pub fn run_read_page(
    handle: &mut DeviceHandle,
    block: u32,
    page: u32,
    full: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let info = handle.chip_info();
    let mut data = vec![0u8; info.page_size as usize];
    let mut oob = vec![0u8; info.spare_size as usize];
    let addr = PageAddr::new(block, page);

    println!("read {}", addr);
    handle.read_page(addr, Some(&mut data), Some(&mut oob))?;

    let limit = (!full).then_some(SHORT_DUMP_LEN);
    println!("page data:");
    print_dump(&data, limit);
    println!("oob data:");
    print_dump(&oob, limit);
    Ok(())
}

/// Program one erased page
pub fn run_write_page(
    handle: &mut DeviceHandle,
    block: u32,
    page: u32,
    input: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let page_size = handle.chip_info().page_size as usize;
    let data = match input {
        Some(path) => {
            let mut data = fs::read(path)?;
            if data.len() > page_size {
                return Err(format!(
                    "{:?} holds {} bytes, more than one page ({} bytes)",
                    path,
                    data.len(),
                    page_size
                )
                .into());
            }
            data.resize(page_size, 0xff);
            data
        }
        None => test_pattern(page_size),
    };

    let addr = PageAddr::new(block, page);
    handle.write_page(addr, &data)?;
    println!("Programmed {}", addr);
    Ok(())
}

/// Dump one page's spare area
pub fn run_read_oob(
    handle: &mut DeviceHandle,
    block: u32,
    page: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut oob = vec![0u8; handle.chip_info().spare_size as usize];
    let addr = PageAddr::new(block, page);

    println!("read oob on {}", addr);
    handle.read_oob(addr, &mut oob)?;
    println!("oob data:");
    print_dump(&oob, Some(SHORT_DUMP_LEN));
    Ok(())
}

/// Erase every block with a progress bar
pub fn run_erase_chip(handle: &mut DeviceHandle) -> Result<(), Box<dyn std::error::Error>> {
    let blocks = handle.chip_info().block_count;

    let pb = ProgressBar::new(blocks as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} blocks ({eta}) Erasing")?
            .progress_chars("#>-"),
    );

    let failed = handle.erase_chip(|block| pb.set_position(block as u64 + 1))?;

    if failed.is_empty() {
        pb.finish_with_message("Erase complete");
        println!("Erased {} blocks", blocks);
    } else {
        pb.abandon();
        println!(
            "Erased {} of {} blocks; failed: {:?}",
            blocks as usize - failed.len(),
            blocks,
            failed
        );
    }
    Ok(())
}
