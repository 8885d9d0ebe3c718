//! # Boot Parameter Block
//!
//! The fixed-layout record the loader fills in before jumping to the
//! decompression stage. Keep everything `#[repr(C)]` with explicit reserved
//! bytes so the block has a single well-defined byte image; the entropy seed
//! hashes it through [`BootParams::as_bytes`].

use crate::region::MemoryRegion;

/// Capacity of the firmware memory map.
pub const MAX_MEMORY_MAP_ENTRIES: usize = 128;

bitflags::bitflags! {
    /// Loader status flags.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LoadFlags: u8 {
        /// Image was loaded above the 1 MiB line.
        const LOADED_HIGH = 1 << 0;
        /// Layout randomization was applied to this boot.
        const LAYOUT_RANDOMIZED = 1 << 1;
        /// Loader asks for minimal console chatter.
        const QUIET = 1 << 5;
        /// The loader heap fields are valid.
        const CAN_USE_HEAP = 1 << 7;
    }
}

/// Firmware classification of a memory map entry.
///
/// Stored directly in the ABI struct; the loader must only write the values
/// below. We avoid Rust enums with payloads across the ABI boundary.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// RAM the image may be placed in.
    Usable = 1,
    /// Firmware-reserved, never placed in.
    Reserved = 2,
    /// ACPI tables, reclaimable after parsing.
    AcpiReclaimable = 3,
    /// ACPI non-volatile storage.
    AcpiNvs = 4,
    /// Defective or otherwise unusable RAM.
    Unusable = 5,
}

/// One firmware memory map entry.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMapEntry {
    /// Physical start of the range.
    pub addr: u64,
    /// Length of the range in bytes.
    pub size: u64,
    /// Firmware classification.
    pub kind: RegionKind,
    reserved: u32,
}

impl MemoryMapEntry {
    /// A zero-length reserved entry, used to fill unused map capacity.
    pub const EMPTY: Self = Self::new(0, 0, RegionKind::Reserved);

    #[must_use]
    pub const fn new(addr: u64, size: u64, kind: RegionKind) -> Self {
        Self {
            addr,
            size,
            kind,
            reserved: 0,
        }
    }

    /// Whether the image may legally be placed inside this range.
    #[inline]
    #[must_use]
    pub const fn is_usable_ram(&self) -> bool {
        matches!(self.kind, RegionKind::Usable)
    }

    /// The entry as a placement region.
    #[inline]
    #[must_use]
    pub const fn region(&self) -> MemoryRegion {
        MemoryRegion::new(self.addr, self.size)
    }
}

/// Fixed-capacity firmware memory map, entry count first.
#[repr(C)]
#[derive(Clone)]
pub struct MemoryMap {
    len: u32,
    reserved: u32,
    entries: [MemoryMapEntry; MAX_MEMORY_MAP_ENTRIES],
}

impl MemoryMap {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            len: 0,
            reserved: 0,
            entries: [MemoryMapEntry::EMPTY; MAX_MEMORY_MAP_ENTRIES],
        }
    }

    /// Build a map from a slice, truncating at capacity.
    #[must_use]
    pub fn from_entries(src: &[MemoryMapEntry]) -> Self {
        let mut map = Self::empty();
        let take = src.len().min(MAX_MEMORY_MAP_ENTRIES);
        map.entries[..take].copy_from_slice(&src[..take]);
        #[allow(clippy::cast_possible_truncation)]
        {
            map.len = take as u32;
        }
        map
    }

    /// The populated entries, in firmware order. A corrupt count field is
    /// clamped to capacity rather than trusted.
    #[must_use]
    pub fn entries(&self) -> &[MemoryMapEntry] {
        let len = (self.len as usize).min(MAX_MEMORY_MAP_ENTRIES);
        &self.entries[..len]
    }
}

/// Header of one auxiliary boot-data node; `len` payload bytes follow it
/// directly in memory.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AuxDataHeader {
    /// Physical address of the next node, or 0 at list end.
    pub next: u64,
    /// Payload discriminator, opaque to this stage.
    pub kind: u32,
    /// Payload length in bytes, excluding this header.
    pub len: u32,
}

/// Lazy walk over the auxiliary boot-data list.
///
/// Yields each node's occupied region, header included. The walk is finite,
/// non-restartable, and meant to be consumed once per query; it is never
/// materialized into a table.
pub struct AuxDataWalk {
    next: u64,
}

impl Iterator for AuxDataWalk {
    type Item = MemoryRegion;

    fn next(&mut self) -> Option<MemoryRegion> {
        if self.next == 0 {
            return None;
        }
        let addr = self.next;
        // SAFETY: trusted loader input; nodes stay resident for the whole
        // boot stage (see `BootParams`).
        let header = unsafe { &*((addr as usize) as *const AuxDataHeader) };
        self.next = header.next;
        Some(MemoryRegion::new(
            addr,
            size_of::<AuxDataHeader>() as u64 + u64::from(header.len),
        ))
    }
}

/// Source of auxiliary boot-data regions.
///
/// Placement queries take a fresh sequence per call; implementations decide
/// whether that is a pointer walk ([`BootParams`]) or a slice.
pub trait AuxRegions {
    /// Produce a fresh walk over the auxiliary regions.
    fn regions(&self) -> impl Iterator<Item = MemoryRegion> + '_;
}

/// Slice-backed source for fixed layouts and tests.
impl AuxRegions for [MemoryRegion] {
    fn regions(&self) -> impl Iterator<Item = MemoryRegion> + '_ {
        self.iter().copied()
    }
}

/// The boot-parameter block.
///
/// Trusted input: the loader guarantees that `cmdline_ptr`, `aux_data_head`
/// and every `next` link reference live, identity-mapped memory that stays
/// resident for the duration of the boot stage. All accessor methods rely on
/// that guarantee instead of re-validating addresses.
#[repr(C)]
#[derive(Clone)]
pub struct BootParams {
    /// Working-buffer reserve the decompressor needs past the output
    /// address; the avoidance catalog protects `[image, output + init_size)`.
    pub init_size: u64,
    /// Initial ramdisk base, or 0 when none was loaded.
    pub ramdisk_image: u64,
    /// Initial ramdisk size in bytes.
    pub ramdisk_size: u64,
    /// Kernel command line, NUL-terminated.
    pub cmdline_ptr: u64,
    /// Command-line size in bytes, including the terminating NUL.
    pub cmdline_size: u64,
    /// Head of the auxiliary boot-data list, or 0 when empty.
    pub aux_data_head: u64,
    /// Loader status flags.
    pub loadflags: LoadFlags,
    reserved: [u8; 7],
    /// Firmware-reported physical memory map.
    pub mmap: MemoryMap,
}

impl BootParams {
    /// An all-zero block; tests and synthetic setups fill in what they need.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            init_size: 0,
            ramdisk_image: 0,
            ramdisk_size: 0,
            cmdline_ptr: 0,
            cmdline_size: 0,
            aux_data_head: 0,
            loadflags: LoadFlags::empty(),
            reserved: [0; 7],
            mmap: MemoryMap::empty(),
        }
    }

    /// The block's raw byte image, hashed into the entropy seed.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `#[repr(C)]` with explicit reserved fields leaves no
        // uninitialized padding anywhere in the struct.
        unsafe {
            core::slice::from_raw_parts(core::ptr::from_ref(self).cast::<u8>(), size_of::<Self>())
        }
    }

    /// The command line bytes, empty when the loader provided none.
    #[must_use]
    pub fn cmdline_bytes(&self) -> &[u8] {
        if self.cmdline_ptr == 0 || self.cmdline_size == 0 {
            return &[];
        }
        // SAFETY: trusted loader input, resident for the boot stage.
        unsafe {
            core::slice::from_raw_parts(
                (self.cmdline_ptr as usize) as *const u8,
                self.cmdline_size as usize,
            )
        }
    }

    /// The region occupied by the block itself.
    #[must_use]
    pub fn self_region(&self) -> MemoryRegion {
        MemoryRegion::new(core::ptr::from_ref(self) as u64, size_of::<Self>() as u64)
    }
}

impl AuxRegions for BootParams {
    fn regions(&self) -> impl Iterator<Item = MemoryRegion> + '_ {
        AuxDataWalk {
            next: self.aux_data_head,
        }
    }
}

const _: () = {
    // The block must have a stable, padding-free byte image.
    assert!(size_of::<MemoryMapEntry>() == 24);
    assert!(size_of::<MemoryMap>() == 8 + 24 * MAX_MEMORY_MAP_ENTRIES);
    assert!(size_of::<BootParams>() == 56 + size_of::<MemoryMap>());
    assert!(align_of::<BootParams>() == 8);
};
