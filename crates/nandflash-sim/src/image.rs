//! Sparse image files
//!
//! Only pages holding data are stored. Layout, all integers little endian:
//!
//! ```text
//! "NANDSIM1"
//! u32 page_size, u32 spare_size, u32 pages_per_block, u32 block_count
//! u32 record count
//! record*: u32 row, page_size + spare_size raw bytes
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::SimError;
use crate::SimController;

const MAGIC: &[u8; 8] = b"NANDSIM1";

fn read_u32<R: Read>(r: &mut R) -> Result<u32, SimError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(truncated)?;
    Ok(u32::from_le_bytes(buf))
}

fn truncated(e: std::io::Error) -> SimError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        SimError::Truncated
    } else {
        SimError::Io(e)
    }
}

impl SimController {
    /// Geometry header as stored in an image
    fn image_header(&self) -> [u32; 4] {
        let g = &self.config.geometry;
        [g.page_size, g.spare_size, g.pages_per_block, g.block_count]
    }

    /// Write every programmed page to `w`
    pub fn write_image<W: Write>(&self, w: &mut W) -> Result<(), SimError> {
        w.write_all(MAGIC)?;
        for field in self.image_header() {
            w.write_all(&field.to_le_bytes())?;
        }
        w.write_all(&(self.pages.len() as u32).to_le_bytes())?;
        for (row, page) in &self.pages {
            w.write_all(&row.to_le_bytes())?;
            w.write_all(page)?;
        }
        Ok(())
    }

    /// Replace the chip contents with an image read from `r`
    pub fn read_image<R: Read>(&mut self, r: &mut R) -> Result<(), SimError> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic).map_err(truncated)?;
        if &magic != MAGIC {
            return Err(SimError::BadMagic);
        }

        let mut found = [0u32; 4];
        for field in found.iter_mut() {
            *field = read_u32(r)?;
        }
        let expected = self.image_header();
        if found != expected {
            return Err(SimError::GeometryMismatch {
                expected: format!("{:?}", expected),
                found: format!("{:?}", found),
            });
        }

        let count = read_u32(r)?;
        let raw_len = self.raw_page_size();
        let mut pages = std::collections::BTreeMap::new();
        for _ in 0..count {
            let row = read_u32(r)?;
            if row as u64 >= self.total_pages() {
                return Err(SimError::PageOutOfRange(row));
            }
            let mut page = vec![0u8; raw_len].into_boxed_slice();
            r.read_exact(&mut page).map_err(truncated)?;
            pages.insert(row, page);
        }

        log::debug!("Loaded {} pages from image", pages.len());
        self.pages = pages;
        Ok(())
    }

    /// Save the chip contents to a file
    pub fn save_image(&self, path: &Path) -> Result<(), SimError> {
        let mut w = BufWriter::new(File::create(path)?);
        self.write_image(&mut w)?;
        w.flush()?;
        Ok(())
    }

    /// Load the chip contents from a file
    pub fn load_image(&mut self, path: &Path) -> Result<(), SimError> {
        let mut r = BufReader::new(File::open(path)?);
        self.read_image(&mut r)
    }
}
