//! # Page-Table Entries
//!
//! One entry layout serves both roles the boot mapper needs:
//!
//! - non-leaf: points at the next-level table (`PS=0`), base 4 KiB-aligned.
//! - 2 MiB leaf: terminal mapping (`PS=1`), base 2 MiB-aligned.
//!
//! Because every base this crate writes is at least 2 MiB-aligned, bits
//! `12..21` of the address field are always zero, which keeps the leaf form's
//! PAT bit (bit 12) and its reserved bits (13..20) clear without a second
//! bitfield type.
//!
//! Bits `9..12` are OS-available at every level. Non-leaf entries use them to
//! carry the pool slot of the linked table ([`IdentEntry::scratch_index`])
//! plus a marker that the slot is meaningful ([`IdentEntry::scratch_linked`]).

use bitfield_struct::bitfield;
use core::fmt;

/// An entry in one of the boot scratch tables.
#[bitfield(u64)]
pub struct IdentEntry {
    /// Present (bit 0).
    pub present: bool,
    /// Writable (bit 1).
    pub writable: bool,
    /// User (bit 2): never set here; the boot stage runs at CPL0.
    pub user: bool,
    /// Write-Through (bit 3).
    pub write_through: bool,
    /// Cache Disable (bit 4).
    pub cache_disable: bool,
    /// Accessed (bit 5): pre-set so the CPU never writes the entry back.
    pub accessed: bool,
    /// Dirty (bit 6): meaningful in the leaf form only; pre-set there.
    pub dirty: bool,
    /// Page Size (bit 7): 0 = next table, 1 = 2 MiB leaf.
    pub page_size: bool,
    /// Global (bit 8): never set; these mappings die with the boot stage.
    pub global: bool,
    /// OS-available (bits 9..10): pool slot of the linked table.
    #[bits(2)]
    pub scratch_index: u8,
    /// OS-available (bit 11): set when [`scratch_index`](Self::scratch_index) is valid.
    pub scratch_linked: bool,
    /// Physical base (bits 12..51). 4 KiB-aligned for tables, 2 MiB-aligned
    /// for leaves.
    #[bits(40)]
    addr_51_12: u64,
    /// OS-available / reserved (bits 52..62): unused.
    #[bits(11)]
    __os_rsv_52_62: u16,
    /// No-Execute (bit 63): left clear; the image decompresses and runs here.
    pub no_execute: bool,
}

impl IdentEntry {
    /// Store a physical base address (low 12 bits must be zero).
    #[inline]
    #[must_use]
    pub const fn with_address(self, addr: u64) -> Self {
        self.with_addr_51_12(addr >> 12)
    }

    /// The physical base address carried by this entry.
    #[inline]
    #[must_use]
    pub const fn address(self) -> u64 {
        self.addr_51_12() << 12
    }

    /// Non-leaf entry linking pool slot `slot` at physical `table_addr`.
    #[must_use]
    pub const fn link(slot: u8, table_addr: u64) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_accessed(true)
            .with_scratch_index(slot)
            .with_scratch_linked(true)
            .with_address(table_addr)
    }

    /// 2 MiB leaf entry mapping `base` (must be 2 MiB-aligned).
    #[must_use]
    pub const fn leaf(base: u64) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_accessed(true)
            .with_dirty(true)
            .with_page_size(true)
            .with_address(base)
    }
}

/// The two entry levels above the 2 MiB leaves.
///
/// Scratch tables are claimed while linking an entry at one of these levels;
/// the level travels with [`MapError::PoolExhausted`](crate::MapError::PoolExhausted)
/// so the boot log says where the arena ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// The root table, indexed by address bits `[47:39]`.
    Top,
    /// The middle table, indexed by address bits `[38:30]`.
    Mid,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top => f.write_str("top-level"),
            Self::Mid => f.write_str("mid-level"),
        }
    }
}
