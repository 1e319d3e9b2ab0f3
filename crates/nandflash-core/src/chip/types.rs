//! NAND chip type definitions

use alloc::string::String;

/// Maximum number of identification bytes stored per chip
pub const MAX_ID_LEN: usize = 8;

/// Number of bytes returned by the READ ID command
pub const ID_READ_LEN: usize = 6;

/// Datasheet timing parameters, all in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct NandTiming {
    /// CLE setup time (tCLS)
    pub t_cls: u32,
    /// ALE setup time (tALS)
    pub t_als: u32,
    /// Write cycle time (tWC)
    pub t_wc: u32,
    /// WE# pulse width (tWP)
    pub t_wp: u32,
    /// WE# high hold time (tWH)
    pub t_wh: u32,
    /// Read cycle time (tRC)
    pub t_rc: u32,
    /// RE# pulse width (tRP)
    pub t_rp: u32,
    /// RE# high hold time (tREH)
    pub t_reh: u32,
}

/// Physical layout of a NAND chip
///
/// Fixed for the life of the driver once a descriptor has been chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct ChipGeometry {
    /// Number of erase blocks
    pub block_count: u32,
    /// Pages in one erase block
    pub pages_per_block: u32,
    /// Data bytes per page
    pub page_size: u32,
    /// Out-of-band (spare) bytes per page
    pub spare_size: u32,
    /// Column address cycles
    pub col_cycles: u8,
    /// Row address cycles
    pub row_cycles: u8,
    /// Datasheet timing
    pub timing: NandTiming,
}

impl ChipGeometry {
    /// Total number of pages on the chip
    pub const fn total_pages(&self) -> u64 {
        self.block_count as u64 * self.pages_per_block as u64
    }

    /// Data bytes in one erase block
    pub const fn block_size(&self) -> usize {
        self.page_size as usize * self.pages_per_block as usize
    }

    /// Data plus spare bytes in one page
    pub const fn raw_page_size(&self) -> usize {
        (self.page_size + self.spare_size) as usize
    }

    /// Total data capacity in bytes
    pub const fn total_size(&self) -> u64 {
        self.page_size as u64 * self.total_pages()
    }
}

/// Bus wiring between controller and chip(s)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum BusType {
    /// One 8-bit chip
    #[default]
    SingleChannel8Bit,
    /// One 16-bit chip
    SingleChannel16Bit,
    /// Two 8-bit chips side by side on a 16-bit bus
    DoubleChannel16Bit,
}

impl BusType {
    /// Number of parallel channels
    pub const fn channels(self) -> u32 {
        match self {
            Self::DoubleChannel16Bit => 2,
            _ => 1,
        }
    }

    /// Data bus width in bits
    pub const fn width(self) -> u32 {
        match self {
            Self::SingleChannel8Bit => 8,
            _ => 16,
        }
    }
}

impl core::fmt::Display for BusType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::SingleChannel8Bit => write!(f, "single channel, 8-bit"),
            Self::SingleChannel16Bit => write!(f, "single channel, 16-bit"),
            Self::DoubleChannel16Bit => write!(f, "double channel, 16-bit"),
        }
    }
}

/// Static description of a NAND chip
///
/// This is what the driver is built from: identification bytes to expect
/// from READ ID, the geometry and the bus wiring on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct ChipDescriptor {
    /// Vendor name (e.g., "Hynix")
    pub vendor: String,
    /// Chip name (e.g., "H27UBG8T2A")
    pub name: String,
    /// Expected identification bytes (manufacturer, device, extended)
    pub id: heapless::Vec<u8, MAX_ID_LEN>,
    /// Physical layout and timing
    pub geometry: ChipGeometry,
    /// Bus wiring
    pub bus: BusType,
    /// Number of chip selects populated
    pub chip_selects: u8,
}

impl ChipDescriptor {
    /// Manufacturer ID byte
    pub fn manufacturer_id(&self) -> u8 {
        self.id.first().copied().unwrap_or(0)
    }

    /// Device ID byte
    pub fn device_id(&self) -> u8 {
        self.id.get(1).copied().unwrap_or(0)
    }

    /// Check the bytes returned by READ ID against this descriptor
    ///
    /// Every byte the descriptor knows must match; extra bytes returned by
    /// the chip are ignored. A descriptor with fewer than two ID bytes never
    /// matches.
    pub fn matches_id(&self, id: &[u8]) -> bool {
        self.id.len() >= 2 && id.len() >= self.id.len() && id[..self.id.len()] == self.id[..]
    }

    /// Hynix H27UBG8T2A, 32 Gbit MLC, 8-bit bus
    pub fn hynix_h27ubg8t2a() -> Self {
        Self {
            vendor: String::from("Hynix"),
            name: String::from("H27UBG8T2A"),
            id: heapless::Vec::from_slice(&[0xAD, 0xD7, 0x94, 0x9A, 0x74, 0x42])
                .unwrap_or_default(),
            geometry: ChipGeometry {
                block_count: 1024,
                pages_per_block: 256,
                page_size: 8192,
                spare_size: 448,
                col_cycles: 2,
                row_cycles: 3,
                timing: NandTiming {
                    t_cls: 12,
                    t_als: 12,
                    t_wc: 25,
                    t_wp: 12,
                    t_wh: 10,
                    t_rc: 25,
                    t_rp: 12,
                    t_reh: 10,
                },
            },
            bus: BusType::SingleChannel8Bit,
            chip_selects: 1,
        }
    }
}

/// Chips known without loading any database file
pub fn builtin_chips() -> alloc::vec::Vec<ChipDescriptor> {
    alloc::vec![ChipDescriptor::hynix_h27ubg8t2a()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hynix_geometry() {
        let chip = ChipDescriptor::hynix_h27ubg8t2a();
        assert_eq!(chip.geometry.total_pages(), 262_144);
        assert_eq!(chip.geometry.block_size(), 2 * 1024 * 1024);
        assert_eq!(chip.geometry.raw_page_size(), 8640);
        assert_eq!(chip.geometry.total_size(), 2 * 1024 * 1024 * 1024);
        assert_eq!(chip.manufacturer_id(), 0xAD);
        assert_eq!(chip.device_id(), 0xD7);
    }

    #[test]
    fn test_matches_id() {
        let chip = ChipDescriptor::hynix_h27ubg8t2a();
        assert!(chip.matches_id(&[0xAD, 0xD7, 0x94, 0x9A, 0x74, 0x42]));
        assert!(chip.matches_id(&[0xAD, 0xD7, 0x94, 0x9A, 0x74, 0x42, 0x00, 0x00]));
        assert!(!chip.matches_id(&[0xAD, 0xD7, 0x94]));
        assert!(!chip.matches_id(&[0xEC, 0xD7, 0x94, 0x9A, 0x74, 0x42]));
        assert!(!chip.matches_id(&[0xFF; 6]));
    }

    #[test]
    fn test_bus_type() {
        assert_eq!(BusType::SingleChannel8Bit.width(), 8);
        assert_eq!(BusType::DoubleChannel16Bit.channels(), 2);
        assert_eq!(BusType::SingleChannel16Bit.channels(), 1);
    }
}
