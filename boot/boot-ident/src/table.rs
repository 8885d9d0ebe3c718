//! # Scratch Tables
//!
//! The fixed arena the boot mapper draws page tables from. Four tables cover
//! the realistic worst case for a decompression run: one root, one middle
//! table, and two leaf directories (each leaf directory spans 1 GiB of
//! identity-mapped space).

use crate::entry::{IdentEntry, Level};
use crate::map::MapError;
use log::debug;

/// Number of tables in the arena.
pub const SCRATCH_TABLES: usize = 4;

/// One 4 KiB page table: 512 entries, 4 KiB-aligned.
#[repr(C, align(4096))]
pub struct IdentTable {
    entries: [IdentEntry; 512],
}

impl IdentTable {
    /// A fully zeroed table (all entries non-present).
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [IdentEntry::new(); 512],
        }
    }

    /// Read the entry at `i`. Callers derive `i` from masked address bits,
    /// so it is always in `0..512`.
    #[inline]
    #[must_use]
    pub const fn get(&self, i: usize) -> IdentEntry {
        self.entries[i]
    }

    /// Write the entry at `i`.
    #[inline]
    pub const fn set(&mut self, i: usize, e: IdentEntry) {
        self.entries[i] = e;
    }

    const fn clear(&mut self) {
        self.entries = [IdentEntry::new(); 512];
    }
}

/// The table arena plus a claim watermark. Slots are handed out in order and
/// never returned; the arena lives exactly as long as the boot stage.
pub struct ScratchPool {
    tables: [IdentTable; SCRATCH_TABLES],
    claimed: usize,
}

impl ScratchPool {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tables: [
                IdentTable::zeroed(),
                IdentTable::zeroed(),
                IdentTable::zeroed(),
                IdentTable::zeroed(),
            ],
            claimed: 0,
        }
    }

    /// Claim the next free slot for a table linked at `level`.
    ///
    /// # Errors
    /// [`MapError::PoolExhausted`] once all slots are claimed. Previously
    /// claimed tables are not disturbed by a failed claim.
    #[allow(clippy::cast_possible_truncation)]
    pub fn claim(&mut self, level: Level) -> Result<u8, MapError> {
        if self.claimed == SCRATCH_TABLES {
            return Err(MapError::PoolExhausted { level });
        }
        let slot = self.claimed;
        // Fresh tables start empty even if the arena memory was reused.
        self.tables[slot].clear();
        self.claimed += 1;
        debug!("claimed scratch table {slot} for a {level} entry");
        Ok(slot as u8)
    }

    /// Slots claimed so far.
    #[inline]
    #[must_use]
    pub const fn claimed(&self) -> usize {
        self.claimed
    }

    /// Physical address of the table in `slot`. The boot stage runs
    /// identity-mapped, so the table's pointer is its physical address.
    #[inline]
    #[must_use]
    pub fn table_address(&self, slot: u8) -> u64 {
        core::ptr::from_ref(&self.tables[slot as usize]) as u64
    }

    #[inline]
    pub(crate) const fn table(&self, slot: u8) -> &IdentTable {
        &self.tables[slot as usize]
    }

    #[inline]
    pub(crate) const fn table_mut(&mut self, slot: u8) -> &mut IdentTable {
        &mut self.tables[slot as usize]
    }
}

impl Default for ScratchPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_hand_out_slots_in_order_then_fail() {
        let mut pool = ScratchPool::new();
        assert_eq!(pool.claim(Level::Top), Ok(0));
        assert_eq!(pool.claim(Level::Top), Ok(1));
        assert_eq!(pool.claim(Level::Mid), Ok(2));
        assert_eq!(pool.claim(Level::Mid), Ok(3));
        assert_eq!(
            pool.claim(Level::Mid),
            Err(MapError::PoolExhausted { level: Level::Mid })
        );
        assert_eq!(pool.claimed(), SCRATCH_TABLES);
    }

    #[test]
    fn claim_failure_leaves_existing_tables_alone() {
        let mut pool = ScratchPool::new();
        let slot = pool.claim(Level::Top).unwrap();
        pool.table_mut(slot).set(7, IdentEntry::leaf(0x0060_0000));
        for _ in 1..SCRATCH_TABLES {
            pool.claim(Level::Mid).unwrap();
        }
        assert!(pool.claim(Level::Mid).is_err());
        assert_eq!(pool.table(slot).get(7).address(), 0x0060_0000);
    }

    #[test]
    fn table_addresses_are_page_aligned() {
        let pool = ScratchPool::new();
        for slot in 0..SCRATCH_TABLES {
            #[allow(clippy::cast_possible_truncation)]
            let addr = pool.table_address(slot as u8);
            assert_eq!(addr % 4096, 0);
        }
    }
}
