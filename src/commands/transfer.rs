//! Sector read and write commands implementation

use indicatif::{ProgressBar, ProgressStyle};
use nandflash_device::DeviceHandle;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Create a standard progress bar
fn create_progress_bar(total: u64, phase: &str) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Sectors from `pos` up to the end of its block, capped at `remaining`
fn sectors_to_block_end(pos: u32, sectors_per_block: u32, remaining: u32) -> u32 {
    (sectors_per_block - pos % sectors_per_block).min(remaining)
}

/// Pad data with 0xFF to a whole number of pages
fn pad_to_pages(data: &mut Vec<u8>, page_size: usize) {
    let rem = data.len() % page_size;
    if rem != 0 {
        data.resize(data.len() + page_size - rem, 0xff);
    }
}

/// Read sectors to a file
pub fn run_read(
    handle: &mut DeviceHandle,
    output: &Path,
    start: u32,
    count: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let geometry = handle.geometry();
    if start >= geometry.sector_count {
        return Err(format!(
            "Start sector {} is beyond the end of the chip ({} sectors)",
            start, geometry.sector_count
        )
        .into());
    }
    let count = count.unwrap_or(geometry.sector_count - start);
    let ps = geometry.bytes_per_sector as usize;
    let spb = geometry.block_size / geometry.bytes_per_sector;

    let mut file = File::create(output)?;
    let pb = create_progress_bar(count as u64 * ps as u64, "Reading")?;
    let mut buf = vec![0u8; spb as usize * ps];

    let mut pos = start;
    let mut remaining = count;
    while remaining > 0 {
        let n = sectors_to_block_end(pos, spb, remaining);
        let chunk = &mut buf[..n as usize * ps];
        handle.read(pos, chunk)?;
        file.write_all(chunk)?;

        pos += n;
        remaining -= n;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_with_message("Read complete");
    println!(
        "Read {} sectors ({} bytes) to {:?}",
        count,
        count as u64 * ps as u64,
        output
    );
    Ok(())
}

/// Write a file to sectors
pub fn run_write(
    handle: &mut DeviceHandle,
    input: &Path,
    start: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let geometry = handle.geometry();
    let ps = geometry.bytes_per_sector as usize;
    let spb = geometry.block_size / geometry.bytes_per_sector;

    let mut data = Vec::new();
    File::open(input)?.read_to_end(&mut data)?;
    println!("Read {} bytes from {:?}", data.len(), input);
    pad_to_pages(&mut data, ps);

    let count = (data.len() / ps) as u32;
    if start as u64 + count as u64 > geometry.sector_count as u64 {
        return Err(format!(
            "{} sectors at {} do not fit the chip ({} sectors)",
            count, start, geometry.sector_count
        )
        .into());
    }

    let pb = create_progress_bar(data.len() as u64, "Writing")?;
    let mut pos = start;
    let mut offset = 0;
    let mut remaining = count;
    while remaining > 0 {
        let n = sectors_to_block_end(pos, spb, remaining);
        let len = n as usize * ps;
        handle.write(pos, &data[offset..offset + len])?;

        pos += n;
        offset += len;
        remaining -= n;
        pb.inc(len as u64);
    }
    pb.finish_with_message("Write complete");

    let stats = handle.stats();
    println!(
        "Wrote {} sectors: {} pages programmed, {} direct, {} blocks merged",
        count, stats.pages_programmed, stats.direct_writes, stats.merges
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sectors_to_block_end() {
        assert_eq!(sectors_to_block_end(200, 256, 300), 56);
        assert_eq!(sectors_to_block_end(256, 256, 300), 256);
        assert_eq!(sectors_to_block_end(0, 256, 3), 3);
    }

    #[test]
    fn test_pad_to_pages() {
        let mut data = vec![0u8; 5000];
        pad_to_pages(&mut data, 2048);
        assert_eq!(data.len(), 6144);
        assert_eq!(data[5000], 0xff);

        let mut exact = vec![0u8; 4096];
        pad_to_pages(&mut exact, 2048);
        assert_eq!(exact.len(), 4096);
    }
}
