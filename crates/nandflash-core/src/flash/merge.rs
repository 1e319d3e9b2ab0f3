//! Block-merge writer
//!
//! NAND pages can only be programmed once between erases, and erases cover
//! a whole block. To let callers overwrite any page, a write that would hit
//! a page already holding data reads the enclosing block into a staging
//! buffer, erases it, merges the new pages in and programs back every page
//! that held data.

use alloc::vec;
use alloc::vec::Vec;

use crate::controller::NandController;
use crate::error::{Error, Result};
use crate::flash::{NandContext, PageAddr};
use crate::protocol;

/// Per-page occupancy of one block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBitmap {
    words: Vec<u64>,
    len: usize,
}

impl PageBitmap {
    /// Bitmap for `len` pages, all clear
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Number of pages tracked
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the bitmap tracks no pages
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clear every bit
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Mark a page occupied
    pub fn set(&mut self, index: usize) {
        debug_assert!(index < self.len);
        self.words[index / 64] |= 1u64 << (index % 64);
    }

    /// Whether a page is marked occupied
    pub fn get(&self, index: usize) -> bool {
        index < self.len && self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Number of occupied pages
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Indices of occupied pages in ascending order
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |&i| self.get(i))
    }
}

/// Run of pages inside a single block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Block holding the run
    pub block: u32,
    /// First page of the run
    pub first_page: u32,
    /// Number of pages
    pub pages: u32,
}

/// Split a run of `count` pages starting at `start` into per-block chunks
pub fn split_into_chunks(
    pages_per_block: u32,
    start: PageAddr,
    count: u32,
) -> impl Iterator<Item = Chunk> {
    let mut block = start.block;
    let mut page = start.page;
    let mut remaining = count;

    core::iter::from_fn(move || {
        if remaining == 0 || page >= pages_per_block {
            return None;
        }
        let pages = remaining.min(pages_per_block - page);
        let chunk = Chunk {
            block,
            first_page: page,
            pages,
        };
        remaining -= pages;
        block += 1;
        page = 0;
        Some(chunk)
    })
}

/// Counters describing what a write did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeStats {
    /// Single pages programmed without touching the rest of the block
    pub direct_writes: u32,
    /// Blocks rewritten through the staging buffer
    pub merges: u32,
    /// Blocks erased
    pub erases: u32,
    /// Pages programmed in total, including preserved ones
    pub pages_programmed: u32,
}

impl core::ops::AddAssign for MergeStats {
    fn add_assign(&mut self, rhs: Self) {
        self.direct_writes += rhs.direct_writes;
        self.merges += rhs.merges;
        self.erases += rhs.erases;
        self.pages_programmed += rhs.pages_programmed;
    }
}

/// Overwrite-anywhere writer with a one-block staging buffer
///
/// The buffer is allocated once and reused for every merge.
pub struct MergeWriter {
    staging: Vec<u8>,
    oob: Vec<u8>,
    occupied: PageBitmap,
    page_size: usize,
    pages_per_block: u32,
}

impl MergeWriter {
    /// Allocate a writer sized for the context's chip
    pub fn new(ctx: &NandContext) -> Self {
        let geom = ctx.geometry();
        Self {
            staging: vec![0xff; geom.block_size()],
            oob: vec![0xff; geom.spare_size as usize],
            occupied: PageBitmap::new(geom.pages_per_block as usize),
            page_size: geom.page_size as usize,
            pages_per_block: geom.pages_per_block,
        }
    }

    /// Size of the staging buffer in bytes
    pub fn staging_capacity(&self) -> usize {
        self.staging.len()
    }

    /// Write whole pages starting at `start`
    ///
    /// `data` must be a whole number of pages. The call stops at the first
    /// failing chunk; pages written before the failure are not rolled back.
    pub fn write<C: NandController + ?Sized>(
        &mut self,
        ctrl: &mut C,
        ctx: &mut NandContext,
        start: PageAddr,
        data: &[u8],
    ) -> Result<MergeStats> {
        if data.len() % self.page_size != 0 {
            return Err(Error::InvalidAlignment);
        }
        let count = (data.len() / self.page_size) as u32;
        let first_row = ctx.row_address(start)? as u64;
        if first_row + count as u64 > ctx.geometry().total_pages() {
            return Err(Error::AddressOutOfBounds);
        }

        let mut stats = MergeStats::default();
        let mut offset = 0;
        for chunk in split_into_chunks(self.pages_per_block, start, count) {
            let len = chunk.pages as usize * self.page_size;
            let chunk_data = &data[offset..offset + len];
            offset += len;

            if chunk.pages == 1 && self.page_writable(ctrl, ctx, chunk)? {
                let addr = PageAddr::new(chunk.block, chunk.first_page);
                log::trace!("Direct write to {}", addr);
                protocol::write_page(ctrl, ctx, addr, chunk_data)?;
                stats.direct_writes += 1;
                stats.pages_programmed += 1;
            } else {
                stats += self.merge_chunk(ctrl, ctx, chunk, chunk_data)?;
            }
        }

        Ok(stats)
    }

    /// Whether a single page can be programmed without an erase
    fn page_writable<C: NandController + ?Sized>(
        &mut self,
        ctrl: &mut C,
        ctx: &NandContext,
        chunk: Chunk,
    ) -> Result<bool> {
        if ctx.is_poisoned(chunk.block) {
            return Ok(false);
        }
        let addr = PageAddr::new(chunk.block, chunk.first_page);
        protocol::page_is_erased(ctrl, ctx, addr, &mut self.oob)
    }

    /// Read, erase and rewrite a block with `data` merged in
    fn merge_chunk<C: NandController + ?Sized>(
        &mut self,
        ctrl: &mut C,
        ctx: &mut NandContext,
        chunk: Chunk,
        data: &[u8],
    ) -> Result<MergeStats> {
        let ps = self.page_size;
        self.occupied.clear();

        for (page, buf) in self.staging.chunks_mut(ps).enumerate() {
            let addr = PageAddr::new(chunk.block, page as u32);
            protocol::read_page(ctrl, ctx, addr, Some(buf), Some(&mut self.oob))?;
            if ctx.page_failed(addr) {
                log::debug!("Dropping failed page {}", addr);
                continue;
            }
            if self.oob[0] != 0xff {
                self.occupied.set(page);
            }
        }
        let preserved = self.occupied.count();

        protocol::erase_block(ctrl, ctx, chunk.block)?;

        let start = chunk.first_page as usize * ps;
        self.staging[start..start + data.len()].copy_from_slice(data);
        for page in chunk.first_page..chunk.first_page + chunk.pages {
            self.occupied.set(page as usize);
        }

        log::debug!(
            "Merging block {}: {} new pages at {}, {} pages held data",
            chunk.block,
            chunk.pages,
            chunk.first_page,
            preserved
        );

        let mut programmed = 0;
        for page in self.occupied.iter_set() {
            let buf = &self.staging[page * ps..(page + 1) * ps];
            protocol::write_page(ctrl, ctx, PageAddr::new(chunk.block, page as u32), buf)?;
            programmed += 1;
        }

        Ok(MergeStats {
            direct_writes: 0,
            merges: 1,
            erases: 1,
            pages_programmed: programmed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_bitmap_wide_blocks() {
        let mut bitmap = PageBitmap::new(256);
        bitmap.set(0);
        bitmap.set(63);
        bitmap.set(64);
        bitmap.set(255);
        assert!(bitmap.get(255));
        assert!(!bitmap.get(254));
        assert!(!bitmap.get(256));
        assert_eq!(bitmap.count(), 4);
        assert_eq!(bitmap.iter_set().collect::<Vec<_>>(), [0, 63, 64, 255]);
        bitmap.clear();
        assert_eq!(bitmap.count(), 0);
    }

    #[test]
    fn test_chunks_cross_block() {
        let chunks: Vec<_> = split_into_chunks(256, PageAddr::new(0, 200), 300).collect();
        assert_eq!(
            chunks,
            [
                Chunk {
                    block: 0,
                    first_page: 200,
                    pages: 56
                },
                Chunk {
                    block: 1,
                    first_page: 0,
                    pages: 244
                },
            ]
        );
    }

    #[test]
    fn test_chunks_many_blocks() {
        let chunks: Vec<_> = split_into_chunks(16, PageAddr::new(3, 15), 34).collect();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].pages, 1);
        assert_eq!(chunks[1].pages, 16);
        assert_eq!(chunks[2].pages, 16);
        assert_eq!(chunks[3].pages, 1);
        assert_eq!(chunks[3].block, 6);
        assert_eq!(chunks.iter().map(|c| c.pages).sum::<u32>(), 34);
    }

    #[test]
    fn test_chunks_empty() {
        assert_eq!(split_into_chunks(16, PageAddr::new(0, 0), 0).count(), 0);
    }

    #[test]
    fn test_stats_accumulate() {
        let mut total = MergeStats::default();
        total += MergeStats {
            direct_writes: 1,
            merges: 0,
            erases: 0,
            pages_programmed: 1,
        };
        total += MergeStats {
            direct_writes: 0,
            merges: 1,
            erases: 1,
            pages_programmed: 6,
        };
        assert_eq!(total.pages_programmed, 7);
        assert_eq!(total.merges, 1);
    }
}
