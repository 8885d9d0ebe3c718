//! # Identity Mapper
//!
//! Builds a tree of 2 MiB identity mappings out of the scratch arena:
//! root table, middle table, leaf directory. The root is claimed lazily on
//! the first mapping, so an untouched mapper costs nothing and
//! [`IdentityMap::new`] stays `const` for placement in a static.

use crate::entry::{IdentEntry, Level};
use crate::table::ScratchPool;
use boot_info::layout::{PHYSICAL_ALIGN, align_down};
use boot_info::MemoryRegion;
use log::trace;
use thiserror::Error;

/// Errors from growing the identity mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MapError {
    /// All scratch tables are in use.
    #[error("scratch table pool exhausted while linking a {level} entry")]
    PoolExhausted { level: Level },
}

const fn top_index(addr: u64) -> usize {
    ((addr >> 39) & 0x1ff) as usize
}

const fn mid_index(addr: u64) -> usize {
    ((addr >> 30) & 0x1ff) as usize
}

const fn leaf_index(addr: u64) -> usize {
    ((addr >> 21) & 0x1ff) as usize
}

/// A single identity-mapped address space rooted in the scratch arena.
pub struct IdentityMap {
    pool: ScratchPool,
    root: Option<u8>,
}

impl IdentityMap {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pool: ScratchPool::new(),
            root: None,
        }
    }

    /// Identity-map every 2 MiB page touching `region`.
    ///
    /// The region is widened to 2 MiB boundaries first; an empty region maps
    /// nothing and claims nothing.
    ///
    /// # Errors
    /// [`MapError::PoolExhausted`] when the arena runs out mid-walk. Pages
    /// mapped before the failure stay mapped.
    pub fn cover(&mut self, region: MemoryRegion) -> Result<(), MapError> {
        if region.is_empty() {
            return Ok(());
        }
        let mut page = align_down(region.start, PHYSICAL_ALIGN);
        while page < region.end() {
            self.extend(page)?;
            page += PHYSICAL_ALIGN;
        }
        Ok(())
    }

    /// Identity-map the single 2 MiB page containing `addr`.
    ///
    /// # Errors
    /// [`MapError::PoolExhausted`] when a missing intermediate table cannot
    /// be claimed.
    pub fn extend(&mut self, addr: u64) -> Result<(), MapError> {
        let root = self.root_slot()?;
        let mid = self.linked_or_claim(root, top_index(addr), Level::Top)?;
        let leaf_dir = self.linked_or_claim(mid, mid_index(addr), Level::Mid)?;
        let base = align_down(addr, PHYSICAL_ALIGN);
        self.pool
            .table_mut(leaf_dir)
            .set(leaf_index(addr), IdentEntry::leaf(base));
        trace!("identity-mapped 2 MiB page at {base:#x}");
        Ok(())
    }

    /// Scratch tables consumed so far.
    #[must_use]
    pub const fn claimed_tables(&self) -> usize {
        self.pool.claimed()
    }

    /// Load CR3 with this mapping's root table.
    ///
    /// A mapper that never mapped anything has no root and leaves the
    /// incoming tables in place.
    ///
    /// # Safety
    /// Must run at CPL0 with paging enabled, and every address the boot
    /// stage still touches (code, stack, data, and the tables themselves)
    /// must be covered by this mapping.
    pub unsafe fn activate(&self) {
        let Some(root) = self.root else {
            return;
        };
        let root_addr = self.pool.table_address(root);
        #[cfg(target_arch = "x86_64")]
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) root_addr, options(nostack, preserves_flags));
        }
        #[cfg(not(target_arch = "x86_64"))]
        let _ = root_addr;
    }

    fn root_slot(&mut self) -> Result<u8, MapError> {
        if let Some(slot) = self.root {
            return Ok(slot);
        }
        let slot = self.pool.claim(Level::Top)?;
        self.root = Some(slot);
        Ok(slot)
    }

    fn linked_or_claim(&mut self, table: u8, index: usize, level: Level) -> Result<u8, MapError> {
        let entry = self.pool.table(table).get(index);
        if entry.present() {
            // Walks resolve through the recorded pool slot; the stored
            // address exists for the MMU alone.
            return Ok(entry.scratch_index());
        }
        let slot = self.pool.claim(level)?;
        let link = IdentEntry::link(slot, self.pool.table_address(slot));
        self.pool.table_mut(table).set(index, link);
        Ok(slot)
    }
}

impl Default for IdentityMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::SCRATCH_TABLES;

    fn entry_at(map: &IdentityMap, slot: u8, i: usize) -> IdentEntry {
        map.pool.table(slot).get(i)
    }

    #[test]
    fn first_page_claims_root_mid_and_leaf_directory() {
        let mut map = IdentityMap::new();
        map.extend(0x0010_0000).unwrap();
        assert_eq!(map.claimed_tables(), 3);

        let top = entry_at(&map, 0, 0);
        assert!(top.present() && top.scratch_linked() && !top.page_size());
        assert_eq!(top.scratch_index(), 1);
        assert_eq!(top.address(), map.pool.table_address(1));

        let mid = entry_at(&map, 1, 0);
        assert_eq!(mid.scratch_index(), 2);
        assert_eq!(mid.address(), map.pool.table_address(2));

        let leaf = entry_at(&map, 2, 0);
        assert!(leaf.present() && leaf.page_size() && leaf.dirty());
        assert_eq!(leaf.address(), 0);
    }

    #[test]
    fn leaf_lands_at_the_masked_indices() {
        let mut map = IdentityMap::new();
        map.extend(0x7fe1_2345).unwrap();
        // bits [47:39] = 0, [38:30] = 1, [29:21] = 511
        let mid = entry_at(&map, 1, 1);
        assert!(mid.scratch_linked());
        let leaf = entry_at(&map, mid.scratch_index(), 511);
        assert!(leaf.page_size());
        assert_eq!(leaf.address(), 0x7fe0_0000);
    }

    #[test]
    fn pages_in_the_same_gigabyte_share_tables() {
        let mut map = IdentityMap::new();
        map.cover(MemoryRegion::new(0, 0x0100_0000)).unwrap();
        assert_eq!(map.claimed_tables(), 3);
        for i in 0..8 {
            assert!(entry_at(&map, 2, i).present());
        }
        assert!(!entry_at(&map, 2, 8).present());
    }

    #[test]
    fn cover_widens_to_page_boundaries() {
        let mut map = IdentityMap::new();
        map.cover(MemoryRegion::new(0x003f_f000, 0x2000)).unwrap();
        // straddles the 4 MiB line: leaves 1 and 2
        assert!(entry_at(&map, 2, 1).present());
        assert!(entry_at(&map, 2, 2).present());
        assert!(!entry_at(&map, 2, 0).present());
        assert!(!entry_at(&map, 2, 3).present());
    }

    #[test]
    fn fifth_table_claim_reports_exhaustion_and_keeps_mappings() {
        let mut map = IdentityMap::new();
        map.extend(0).unwrap();
        map.extend(1 << 30).unwrap();
        assert_eq!(map.claimed_tables(), SCRATCH_TABLES);

        let err = map.extend(2 << 30).unwrap_err();
        assert_eq!(err, MapError::PoolExhausted { level: Level::Mid });
        assert!(entry_at(&map, 2, 0).present());
        assert!(entry_at(&map, 3, 0).present());
    }

    #[test]
    fn walks_follow_slots_even_with_a_bogus_stored_address() {
        let mut map = IdentityMap::new();
        map.extend(0).unwrap();

        let top = entry_at(&map, 0, 0);
        map.pool.table_mut(0).set(0, top.with_address(0x0bad_d000));

        map.extend(0x0020_0000).unwrap();
        assert_eq!(map.claimed_tables(), 3);
        assert!(entry_at(&map, 2, 1).present());
    }

    #[test]
    fn empty_region_claims_nothing() {
        let mut map = IdentityMap::new();
        map.cover(MemoryRegion::EMPTY).unwrap();
        assert_eq!(map.claimed_tables(), 0);
    }
}
