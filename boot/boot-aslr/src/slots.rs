//! # Slot Partitioner
//!
//! Breaks usable firmware ranges into aligned placement slots that dodge
//! the avoidance catalog, and draws one slot uniformly over everything
//! found. A contiguous run of legal slots is stored as one [`SlotArea`];
//! the table caps out at [`MAX_SLOT_AREAS`] areas and quietly ignores the
//! rest of the map beyond that.

use boot_entropy::Rng;
use boot_info::MemoryRegion;
use boot_info::layout::{PHYSICAL_ALIGN, align_up};
use log::{trace, warn};

use crate::avoid::AvoidanceSet;

/// Capacity of the slot table. Firmware maps fragmented beyond this give
/// up the remainder rather than spill.
pub const MAX_SLOT_AREAS: usize = 100;

/// A run of `count` aligned placement offsets starting at `addr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotArea {
    /// First slot, aligned to [`PHYSICAL_ALIGN`].
    pub addr: u64,
    /// Number of slots, each [`PHYSICAL_ALIGN`] apart. Never zero.
    pub count: u32,
}

/// Aligned offsets within a `region_size` range that leave room for the
/// whole image. Callers guarantee `region_size >= image_size`.
#[allow(clippy::cast_possible_truncation)]
pub(crate) const fn slot_count(region_size: u64, image_size: u64) -> u32 {
    let count = if image_size <= PHYSICAL_ALIGN {
        region_size / PHYSICAL_ALIGN
    } else {
        (region_size - image_size) / PHYSICAL_ALIGN + 1
    };
    // Physical ranges never approach 2^32 aligned slots.
    count as u32
}

/// Every legal placement offset found so far, as weighted areas.
pub struct SlotTable {
    areas: [SlotArea; MAX_SLOT_AREAS],
    len: usize,
    total_slots: u64,
}

impl SlotTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            areas: [SlotArea { addr: 0, count: 0 }; MAX_SLOT_AREAS],
            len: 0,
            total_slots: 0,
        }
    }

    /// The recorded areas, in discovery order.
    #[must_use]
    pub fn areas(&self) -> &[SlotArea] {
        &self.areas[..self.len]
    }

    /// Total slots across every area.
    #[must_use]
    pub const fn total_slots(&self) -> u64 {
        self.total_slots
    }

    /// Whether the table has no room for further areas.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.len == MAX_SLOT_AREAS
    }

    fn store(&mut self, region: MemoryRegion, image_size: u64) {
        if self.is_full() {
            return;
        }
        let count = slot_count(region.size, image_size);
        if count == 0 {
            return;
        }
        self.areas[self.len] = SlotArea {
            addr: region.start,
            count,
        };
        self.len += 1;
        self.total_slots += u64::from(count);
        trace!("slot area at {:#x}, {count} slots", region.start);
    }

    /// Partition one usable firmware range into slot areas.
    ///
    /// The scan window starts at `entry` clipped to `floor`, aligned up.
    /// Each protected range splits the window: the slice before it is
    /// recorded when it holds at least one whole image, then the scan
    /// resumes past it. Ranges entirely below `floor` contribute nothing.
    pub fn scan_region(
        &mut self,
        entry: MemoryRegion,
        floor: u64,
        image_size: u64,
        avoid: &AvoidanceSet<'_>,
    ) {
        if entry.end() < floor {
            return;
        }

        let mut region = entry;
        while !self.is_full() {
            let raised = align_up(region.start.max(floor), PHYSICAL_ALIGN);
            if raised > region.end() {
                return;
            }
            region = MemoryRegion::new(raised, region.end() - raised);
            if region.size < image_size {
                return;
            }

            let Some(out) = avoid.lowest_overlap(region) else {
                self.store(region, image_size);
                return;
            };

            if out.start > region.start + image_size {
                self.store(
                    MemoryRegion::new(region.start, out.start - region.start),
                    image_size,
                );
            }
            if out.end() >= region.end() {
                return;
            }
            region = MemoryRegion::new(out.end(), region.end() - out.end());
        }
    }

    /// Draw one offset uniformly across every recorded slot.
    pub fn choose<R: Rng>(&self, rng: &mut R) -> Option<u64> {
        if self.total_slots == 0 {
            return None;
        }
        let mut slot = rng.next_u64() % self.total_slots;
        for area in self.areas() {
            let count = u64::from(area.count);
            if slot >= count {
                slot -= count;
                continue;
            }
            return Some(area.addr + slot * PHYSICAL_ALIGN);
        }
        // Unreachable while total_slots matches the stored counts.
        warn!("slot draw walked past the recorded areas");
        None
    }
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::new()
    }
}
