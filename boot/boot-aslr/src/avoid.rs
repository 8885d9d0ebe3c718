//! # Avoidance Catalog
//!
//! The ranges a randomized image must never land on. Four are catalogued
//! eagerly when placement starts: the working range of the stage itself
//! (compressed payload plus the decompression scratch area behind the
//! output), the initial ramdisk, the command line and the boot-parameter
//! block. The auxiliary boot-data list is not copied anywhere; queries walk
//! it through [`AuxRegions`] every time, so the catalog stays fixed-size no
//! matter how long the list grows.
//!
//! Building the catalog also pre-maps the ranges the stage keeps touching
//! while it runs on the new page tables. The ramdisk and the auxiliary
//! nodes are only ever compared against, never read, so they stay unmapped.

use boot_ident::MapError;
use boot_info::{AuxRegions, BootParams, MemoryRegion};

use crate::MappingService;

/// Number of eagerly catalogued ranges.
pub const AVOID_ENTRIES: usize = 4;

/// The ranges placement must dodge, fixed after construction.
pub struct AvoidanceSet<'p> {
    entries: [MemoryRegion; AVOID_ENTRIES],
    params: &'p BootParams,
}

impl<'p> AvoidanceSet<'p> {
    /// Catalogue the protected ranges and pre-map the ones the stage still
    /// reads or writes after the page-table switch.
    ///
    /// `input` is the range holding the compressed payload; `output` is the
    /// default decompression target. The working entry spans both plus the
    /// scratch reserve the loader announced in
    /// [`init_size`](BootParams::init_size).
    pub fn init<M: MappingService>(
        params: &'p BootParams,
        input: MemoryRegion,
        output: u64,
        mapping: &mut M,
    ) -> Result<Self, MapError> {
        debug_assert!(input.start <= output, "payload must sit below the output");

        let working = MemoryRegion::new(input.start, output + params.init_size - input.start);
        let ramdisk = MemoryRegion::new(params.ramdisk_image, params.ramdisk_size);
        let cmdline = MemoryRegion::new(params.cmdline_ptr, params.cmdline_size);
        let block = params.self_region();

        mapping.cover(working)?;
        mapping.cover(cmdline)?;
        mapping.cover(block)?;

        Ok(Self {
            entries: [working, ramdisk, cmdline, block],
            params,
        })
    }

    /// Whether `candidate` intersects any protected range, auxiliary nodes
    /// included.
    #[must_use]
    pub fn overlaps(&self, candidate: MemoryRegion) -> bool {
        self.entries.iter().any(|entry| entry.overlaps(&candidate))
            || self.params.regions().any(|aux| aux.overlaps(&candidate))
    }

    /// The lowest-starting protected range intersecting `candidate`.
    ///
    /// The partitioner clips its scan window past this range and retries,
    /// so picking the lowest keeps the slice before it available.
    #[must_use]
    pub fn lowest_overlap(&self, candidate: MemoryRegion) -> Option<MemoryRegion> {
        self.entries
            .iter()
            .copied()
            .chain(self.params.regions())
            .filter(|region| region.overlaps(&candidate))
            .min_by_key(|region| region.start)
    }

    /// The eagerly catalogued ranges, in registration order.
    #[must_use]
    pub fn fixed_entries(&self) -> &[MemoryRegion] {
        &self.entries
    }
}
