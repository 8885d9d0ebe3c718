//! # Physical Memory Regions

/// A half-open byte range `[start, start + size)` of physical memory.
///
/// Used both for avoidance entries and for firmware-reported RAM ranges.
/// Regions compare by overlap, not by equality; an empty region overlaps
/// nothing. `start + size` must not overflow `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryRegion {
    /// First byte of the region.
    pub start: u64,
    /// Length in bytes.
    pub size: u64,
}

impl MemoryRegion {
    /// The empty region at address zero.
    pub const EMPTY: Self = Self { start: 0, size: 0 };

    #[inline]
    #[must_use]
    pub const fn new(start: u64, size: u64) -> Self {
        Self { start, size }
    }

    /// First byte past the region.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.start + self.size
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Standard half-open interval intersection; touching edges do not
    /// overlap, and empty regions never overlap anything.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.start < other.end()
            && other.start < self.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_is_symmetric() {
        let pairs = [
            (MemoryRegion::new(0, 0x1000), MemoryRegion::new(0x800, 0x1000)),
            (MemoryRegion::new(0, 0x1000), MemoryRegion::new(0x1000, 0x1000)),
            (MemoryRegion::new(0x2000, 0x100), MemoryRegion::new(0, 0x10000)),
            (MemoryRegion::new(0x500, 0x10), MemoryRegion::new(0x505, 0x2)),
            (MemoryRegion::new(0, 0x10), MemoryRegion::new(0x20, 0x10)),
            (MemoryRegion::EMPTY, MemoryRegion::new(0, 0x1000)),
        ];
        for (a, b) in pairs {
            assert_eq!(a.overlaps(&b), b.overlaps(&a), "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn touching_edges_do_not_overlap() {
        let low = MemoryRegion::new(0x10_0000, 0x10_0000);
        let high = MemoryRegion::new(0x20_0000, 0x10_0000);
        assert!(!low.overlaps(&high));
        assert!(!high.overlaps(&low));
    }

    #[test]
    fn containment_overlaps() {
        let outer = MemoryRegion::new(0x10_0000, 0x100_0000);
        let inner = MemoryRegion::new(0x20_0000, 0x1000);
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn empty_regions_never_overlap() {
        let full = MemoryRegion::new(0, u64::MAX / 2);
        let empty_inside = MemoryRegion::new(0x1000, 0);
        assert!(!full.overlaps(&empty_inside));
        assert!(!empty_inside.overlaps(&full));
        assert!(!MemoryRegion::EMPTY.overlaps(&MemoryRegion::EMPTY));
    }

    #[test]
    fn end_is_exclusive() {
        let region = MemoryRegion::new(0x1000, 0x234);
        assert_eq!(region.end(), 0x1234);
    }
}
