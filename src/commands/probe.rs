//! Probe and info commands implementation

use nandflash_device::DeviceHandle;

/// Identify the chip behind an open handle
///
/// Opening the handle already checked the ID against the chip descriptor;
/// this reads it again and shows what was found.
pub fn run_probe(handle: &mut DeviceHandle) -> Result<(), Box<dyn std::error::Error>> {
    let id = handle.read_id()?;
    let status = handle.read_status();
    let info = handle.chip_info();

    println!("Found NAND chip:");
    println!("  Vendor: {}", info.vendor);
    println!("  Name:   {}", info.name);
    println!("  ID:     {}", format_id(&id));
    println!(
        "  Size:   {} bytes ({} MiB)",
        info.total_size(),
        info.total_size() / (1024 * 1024)
    );
    println!("  Status: 0x{:02X}", status);
    Ok(())
}

/// Print chip and controller configuration
pub fn print_chip_info(handle: &DeviceHandle) {
    let info = handle.chip_info();
    let geometry = handle.geometry();

    println!("NAND Chip Information");
    println!("=====================");
    println!();
    println!("Controller:      {}", handle.backend_name());
    println!("Vendor:          {}", info.vendor);
    println!("Name:            {}", info.name);
    println!("ID:              {}", format_id(&info.id));
    println!("Bus:             {}", info.bus);
    println!(
        "Size:            {} bytes ({} MiB)",
        info.total_size(),
        info.total_size() / (1024 * 1024)
    );
    println!(
        "Page size:       {} + {} spare bytes",
        info.page_size, info.spare_size
    );
    println!(
        "Block size:      {} pages ({} KiB)",
        info.pages_per_block,
        info.block_size() / 1024
    );
    println!("Blocks:          {}", info.block_count);
    println!();
    println!("Block device:");
    println!("  Bytes/sector:  {}", geometry.bytes_per_sector);
    println!("  Block size:    {}", geometry.block_size);
    println!("  Sectors:       {}", geometry.sector_count);
    println!();
    println!("Controller configuration:");
    println!(
        "  ECC:           {} x {} steps",
        info.ecc.mode, info.ecc.steps
    );
    println!(
        "  Timing:        TACLS={} TWRPH0={} TWRPH1={}",
        info.timing.tacls, info.timing.twrph0, info.timing.twrph1
    );
    println!("  Config reg:    0x{:08X}", info.cfg_image);
}

fn format_id(id: &[u8]) -> String {
    id.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
