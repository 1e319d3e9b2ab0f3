//! Chip database for lookup by ID or name
//!
//! This module provides the `ChipDatabase` type. It always knows the
//! builtin descriptors; with the `std` feature it can also load vendor
//! files in RON format at runtime.

use alloc::vec::Vec;

use super::types::{builtin_chips, ChipDescriptor};

#[cfg(feature = "std")]
pub use ron_format::{ChipDbError, Size};

/// Collection of known chip descriptors
#[derive(Debug, Clone, Default)]
pub struct ChipDatabase {
    chips: Vec<ChipDescriptor>,
}

impl ChipDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self { chips: Vec::new() }
    }

    /// Create a database pre-populated with the builtin chips
    pub fn with_builtin() -> Self {
        Self {
            chips: builtin_chips(),
        }
    }

    /// Add a descriptor, replacing any existing entry with the same name
    pub fn add(&mut self, chip: ChipDescriptor) {
        if let Some(existing) = self.chips.iter_mut().find(|c| c.name == chip.name) {
            log::debug!("Replacing chip definition for {}", chip.name);
            *existing = chip;
        } else {
            self.chips.push(chip);
        }
    }

    /// Find the chip whose ID bytes match what READ ID returned
    pub fn find_by_id(&self, id: &[u8]) -> Option<&ChipDescriptor> {
        // Longest ID first so a more specific entry wins over a prefix
        self.chips
            .iter()
            .filter(|c| c.matches_id(id))
            .max_by_key(|c| c.id.len())
    }

    /// Find a chip by name (case-insensitive)
    pub fn find_by_name(&self, name: &str) -> Option<&ChipDescriptor> {
        self.chips
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Iterate over all chips
    pub fn iter(&self) -> impl Iterator<Item = &ChipDescriptor> {
        self.chips.iter()
    }

    /// Number of chips in the database
    pub fn len(&self) -> usize {
        self.chips.len()
    }

    /// Whether the database is empty
    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }
}

#[cfg(feature = "std")]
mod ron_format {
    use alloc::format;
    use alloc::string::{String, ToString};
    use alloc::vec::Vec;
    use std::fs;
    use std::io;
    use std::path::Path;

    use super::ChipDatabase;
    use crate::chip::types::{BusType, ChipDescriptor, ChipGeometry, NandTiming, MAX_ID_LEN};

    /// Error type for chip database operations
    #[derive(Debug)]
    pub enum ChipDbError {
        /// I/O error reading files
        Io(io::Error),
        /// RON parsing error
        Parse(ron::error::SpannedError),
        /// Validation error
        Validation(String),
    }

    impl From<io::Error> for ChipDbError {
        fn from(e: io::Error) -> Self {
            ChipDbError::Io(e)
        }
    }

    impl From<ron::error::SpannedError> for ChipDbError {
        fn from(e: ron::error::SpannedError) -> Self {
            ChipDbError::Parse(e)
        }
    }

    impl std::fmt::Display for ChipDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                ChipDbError::Io(e) => write!(f, "I/O error: {}", e),
                ChipDbError::Parse(e) => write!(f, "Parse error: {}", e),
                ChipDbError::Validation(msg) => write!(f, "Validation error: {}", msg),
            }
        }
    }

    impl std::error::Error for ChipDbError {}

    /// Size specification with human-readable units (for RON parsing)
    #[derive(Debug, Clone, Copy, serde::Deserialize)]
    pub enum Size {
        /// Size in bytes
        B(u32),
        /// Size in kibibytes (1024 bytes)
        KiB(u32),
    }

    impl Size {
        /// Convert to bytes, `None` if the size does not fit in 32 bits
        pub fn to_bytes(self) -> Option<u32> {
            match self {
                Size::B(n) => Some(n),
                Size::KiB(n) => n.checked_mul(1024),
            }
        }
    }

    #[derive(Debug, Clone, Copy, serde::Deserialize)]
    struct AddressCyclesDef {
        col: u8,
        row: u8,
    }

    fn default_chip_selects() -> u8 {
        1
    }

    #[derive(Debug, Clone, serde::Deserialize)]
    struct ChipDef {
        name: String,
        id: Vec<u8>,
        blocks: u32,
        pages_per_block: u32,
        page_size: Size,
        spare_size: Size,
        address_cycles: AddressCyclesDef,
        timing: NandTiming,
        #[serde(default)]
        bus: BusType,
        #[serde(default = "default_chip_selects")]
        chip_selects: u8,
    }

    #[derive(Debug, Clone, serde::Deserialize)]
    struct VendorDef {
        vendor: String,
        chips: Vec<ChipDef>,
    }

    impl ChipDef {
        fn into_descriptor(self, vendor: &str) -> Result<ChipDescriptor, ChipDbError> {
            if self.id.len() < 2 || self.id.len() > MAX_ID_LEN {
                return Err(ChipDbError::Validation(format!(
                    "{}: ID must have 2 to {} bytes, got {}",
                    self.name,
                    MAX_ID_LEN,
                    self.id.len()
                )));
            }
            if self.blocks == 0 || self.pages_per_block == 0 {
                return Err(ChipDbError::Validation(format!(
                    "{}: block and page counts must be non-zero",
                    self.name
                )));
            }
            if (self.blocks as u64) * (self.pages_per_block as u64) > u32::MAX as u64 {
                return Err(ChipDbError::Validation(format!(
                    "{}: {} blocks of {} pages overflow the page index",
                    self.name, self.blocks, self.pages_per_block
                )));
            }
            let page_size = self.page_size.to_bytes().ok_or_else(|| {
                ChipDbError::Validation(format!("{}: page size too large", self.name))
            })?;
            let spare_size = self.spare_size.to_bytes().ok_or_else(|| {
                ChipDbError::Validation(format!("{}: spare size too large", self.name))
            })?;
            let id = heapless::Vec::from_slice(&self.id)
                .map_err(|_| ChipDbError::Validation(format!("{}: ID too long", self.name)))?;

            Ok(ChipDescriptor {
                vendor: vendor.to_string(),
                name: self.name,
                id,
                geometry: ChipGeometry {
                    block_count: self.blocks,
                    pages_per_block: self.pages_per_block,
                    page_size,
                    spare_size,
                    col_cycles: self.address_cycles.col,
                    row_cycles: self.address_cycles.row,
                    timing: self.timing,
                },
                bus: self.bus,
                chip_selects: self.chip_selects,
            })
        }
    }

    impl ChipDatabase {
        /// Load chips from a RON vendor file's contents
        ///
        /// Returns the number of chips added.
        pub fn load_ron(&mut self, contents: &str) -> Result<usize, ChipDbError> {
            let vendor: VendorDef = ron::from_str(contents)?;
            let mut count = 0;
            for def in vendor.chips {
                let chip = def.into_descriptor(&vendor.vendor)?;
                log::trace!("Loaded chip {} {}", chip.vendor, chip.name);
                self.add(chip);
                count += 1;
            }
            Ok(count)
        }

        /// Load a single RON file
        pub fn load_file(&mut self, path: &Path) -> Result<usize, ChipDbError> {
            let contents = fs::read_to_string(path)?;
            self.load_ron(&contents)
        }

        /// Load every `.ron` file in a directory
        pub fn load_dir(&mut self, dir: &Path) -> Result<usize, ChipDbError> {
            let mut total = 0;
            let mut entries: Vec<_> = fs::read_dir(dir)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "ron"))
                .collect();
            entries.sort();

            for path in entries {
                let count = self.load_file(&path)?;
                log::debug!("Loaded {} chips from {}", count, path.display());
                total += count;
            }
            Ok(total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let db = ChipDatabase::with_builtin();
        assert!(!db.is_empty());

        let chip = db
            .find_by_id(&[0xAD, 0xD7, 0x94, 0x9A, 0x74, 0x42])
            .unwrap();
        assert_eq!(chip.name, "H27UBG8T2A");
        assert!(db.find_by_name("h27ubg8t2a").is_some());
        assert!(db.find_by_id(&[0xEC, 0xD3, 0x51, 0x95, 0x58, 0x00]).is_none());
    }

    #[test]
    fn test_add_replaces_by_name() {
        let mut db = ChipDatabase::with_builtin();
        let before = db.len();
        let mut chip = ChipDescriptor::hynix_h27ubg8t2a();
        chip.chip_selects = 2;
        db.add(chip);
        assert_eq!(db.len(), before);
        assert_eq!(db.find_by_name("H27UBG8T2A").unwrap().chip_selects, 2);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_load_ron() {
        let ron = r#"
        (
            vendor: "Samsung",
            chips: [
                (
                    name: "K9F1G08U0E",
                    id: [0xEC, 0xF1, 0x00, 0x95],
                    blocks: 1024,
                    pages_per_block: 64,
                    page_size: KiB(2),
                    spare_size: B(64),
                    address_cycles: (col: 2, row: 2),
                    timing: (
                        t_cls: 12, t_als: 12, t_wc: 25, t_wp: 12,
                        t_wh: 10, t_rc: 25, t_rp: 12, t_reh: 10,
                    ),
                ),
            ],
        )
        "#;

        let mut db = ChipDatabase::new();
        let count = db.load_ron(ron).unwrap();
        assert_eq!(count, 1);

        let chip = db.find_by_id(&[0xEC, 0xF1, 0x00, 0x95, 0x40, 0x00]).unwrap();
        assert_eq!(chip.vendor, "Samsung");
        assert_eq!(chip.geometry.page_size, 2048);
        assert_eq!(chip.geometry.row_cycles, 2);
        assert_eq!(chip.chip_selects, 1);
        assert_eq!(chip.bus, crate::chip::BusType::SingleChannel8Bit);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_load_ron_rejects_short_id() {
        let ron = r#"
        (
            vendor: "Nobody",
            chips: [
                (
                    name: "X",
                    id: [0x01],
                    blocks: 1,
                    pages_per_block: 1,
                    page_size: KiB(2),
                    spare_size: B(64),
                    address_cycles: (col: 2, row: 3),
                    timing: (
                        t_cls: 1, t_als: 1, t_wc: 1, t_wp: 1,
                        t_wh: 1, t_rc: 1, t_rp: 1, t_reh: 1,
                    ),
                ),
            ],
        )
        "#;
        let mut db = ChipDatabase::new();
        assert!(matches!(db.load_ron(ron), Err(ChipDbError::Validation(_))));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_load_ron_rejects_oversized() {
        use alloc::format;

        let chip = |blocks: u32, ppb: u32, page: &str| {
            format!(
                r#"
                (
                    vendor: "Nobody",
                    chips: [
                        (
                            name: "X",
                            id: [0x01, 0x02],
                            blocks: {},
                            pages_per_block: {},
                            page_size: {},
                            spare_size: B(64),
                            address_cycles: (col: 2, row: 4),
                            timing: (
                                t_cls: 1, t_als: 1, t_wc: 1, t_wp: 1,
                                t_wh: 1, t_rc: 1, t_rp: 1, t_reh: 1,
                            ),
                        ),
                    ],
                )
                "#,
                blocks, ppb, page
            )
        };

        let mut db = ChipDatabase::new();
        assert!(matches!(
            db.load_ron(&chip(1 << 23, 1 << 10, "KiB(2)")),
            Err(ChipDbError::Validation(_))
        ));
        assert!(matches!(
            db.load_ron(&chip(1, 1, "KiB(4194304)")),
            Err(ChipDbError::Validation(_))
        ));
        assert!(db.is_empty());
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_load_shipped_chips() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../chips");
        let mut db = ChipDatabase::with_builtin();
        let before = db.len();
        let count = db.load_dir(&dir).unwrap();
        assert!(count >= 2);

        // The Hynix file describes the builtin chip and replaces it
        let hynix = db.find_by_name("h27ubg8t2a").unwrap();
        assert_eq!(*hynix, ChipDescriptor::hynix_h27ubg8t2a());
        assert_eq!(db.len(), before + count - 1);

        for chip in db.iter() {
            let ctx = crate::flash::NandContext::new(chip.clone(), &Default::default());
            assert!(ctx.is_ok(), "{} {} does not configure", chip.vendor, chip.name);
        }
    }
}
