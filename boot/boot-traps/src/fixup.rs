//! # Fixup Table
//!
//! Pairs of (faulting instruction, landing point), both stored self-relative
//! so the table works unmodified wherever the image was loaded. The `insn`
//! offset is relative to the entry's own address; the `fixup` offset is
//! relative to the address of the `fixup` field, four bytes further in.

use core::mem::size_of;

/// One self-relative fixup pair.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct FixupEntry {
    insn: i32,
    fixup: i32,
}

const _: () = assert!(size_of::<FixupEntry>() == 8);

impl FixupEntry {
    /// A blank entry, useful for reserving table slots before
    /// [`encode`](Self::encode) fills them in place.
    #[must_use]
    pub const fn empty() -> Self {
        Self { insn: 0, fixup: 0 }
    }

    /// Build the self-relative pair for an entry that will live at
    /// `entry_addr`. Both targets must be within ±2 GiB of the entry, which
    /// holds trivially for a boot image.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub const fn encode(entry_addr: u64, insn_ip: u64, fixup_ip: u64) -> Self {
        Self {
            insn: insn_ip.wrapping_sub(entry_addr) as i32,
            fixup: fixup_ip.wrapping_sub(entry_addr.wrapping_add(4)) as i32,
        }
    }

    /// Absolute address of the instruction this entry covers.
    #[must_use]
    pub fn instruction_ip(&self) -> u64 {
        (core::ptr::from_ref(self) as u64).wrapping_add_signed(i64::from(self.insn))
    }

    /// Absolute address execution resumes at.
    #[must_use]
    pub fn landing_ip(&self) -> u64 {
        (core::ptr::from_ref(self) as u64)
            .wrapping_add(4)
            .wrapping_add_signed(i64::from(self.fixup))
    }
}

/// Find the landing point for a fault at `ip`, scanning the table in order.
#[must_use]
pub fn resolve_fixup(table: &[FixupEntry], ip: u64) -> Option<u64> {
    table
        .iter()
        .find(|entry| entry.instruction_ip() == ip)
        .map(FixupEntry::landing_ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_in_place(table: &mut [FixupEntry], i: usize, insn_ip: u64, fixup_ip: u64) {
        let entry_addr = core::ptr::from_ref(&table[i]) as u64;
        table[i] = FixupEntry::encode(entry_addr, insn_ip, fixup_ip);
    }

    #[test]
    fn encoded_entries_round_trip_through_their_own_address() {
        let mut table = [FixupEntry::empty(); 2];
        let base = core::ptr::from_ref(&table) as u64;
        encode_in_place(&mut table, 0, base + 0x100, base + 0x104);
        encode_in_place(&mut table, 1, base.wrapping_sub(0x80), base + 0x200);

        assert_eq!(table[0].instruction_ip(), base + 0x100);
        assert_eq!(table[0].landing_ip(), base + 0x104);
        assert_eq!(table[1].instruction_ip(), base.wrapping_sub(0x80));
        assert_eq!(table[1].landing_ip(), base + 0x200);
    }

    #[test]
    fn resolve_returns_the_matching_landing_point() {
        let mut table = [FixupEntry::empty(); 3];
        let base = core::ptr::from_ref(&table) as u64;
        encode_in_place(&mut table, 0, base + 0x10, base + 0x20);
        encode_in_place(&mut table, 1, base + 0x30, base + 0x40);
        encode_in_place(&mut table, 2, base + 0x50, base + 0x60);

        assert_eq!(resolve_fixup(&table, base + 0x30), Some(base + 0x40));
        assert_eq!(resolve_fixup(&table, base + 0x50), Some(base + 0x60));
    }

    #[test]
    fn resolve_misses_unregistered_addresses() {
        let mut table = [FixupEntry::empty(); 1];
        let base = core::ptr::from_ref(&table) as u64;
        encode_in_place(&mut table, 0, base + 0x10, base + 0x20);

        assert_eq!(resolve_fixup(&table, base + 0x11), None);
        assert_eq!(resolve_fixup(&[], base + 0x10), None);
    }
}
