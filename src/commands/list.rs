//! List commands implementation

use nandflash_core::chip::ChipDatabase;

/// List all available controllers
pub fn list_controllers() {
    println!("Available controllers:");
    println!();
    for info in nandflash_device::available_controllers() {
        let aliases = if info.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", info.aliases.join(", "))
        };
        println!("  {:<8} - {}{}", info.name, info.description, aliases);
    }
}

/// List all supported chips
pub fn list_chips(db: &ChipDatabase, vendor_filter: Option<&str>) {
    println!("Supported NAND chips:");
    println!();
    println!(
        "{:<10} {:<14} {:>9} {:>11} {}",
        "Vendor", "Name", "Size", "Page+OOB", "ID"
    );
    println!("{}", "-".repeat(70));

    for chip in db.iter() {
        // Apply vendor filter if specified
        if let Some(vendor) = vendor_filter {
            if !chip.vendor.to_lowercase().contains(&vendor.to_lowercase()) {
                continue;
            }
        }

        let geom = &chip.geometry;
        let page_str = format!("{}+{}", geom.page_size, geom.spare_size);
        let id_str: Vec<String> = chip.id.iter().map(|b| format!("{:02X}", b)).collect();

        println!(
            "{:<10} {:<14} {:>9} {:>11} {}",
            chip.vendor,
            chip.name,
            format_size(geom.total_size()),
            page_str,
            id_str.join(" ")
        );
    }
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 * 1024 {
        format!("{} GiB", bytes / (1024 * 1024 * 1024))
    } else if bytes >= 1024 * 1024 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
