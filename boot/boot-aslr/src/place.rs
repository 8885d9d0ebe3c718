//! # Placement Selection
//!
//! The policy layer: decide whether randomization runs at all, then drive
//! the catalog and the partitioner and report where the image goes. The
//! physical and virtual draws are independent; a boot that finds no usable
//! physical slot still randomizes its virtual offset.

use boot_entropy::Rng;
use boot_ident::MapError;
use boot_info::layout::{
    LOAD_PHYSICAL_ADDR, PHYSICAL_ALIGN, RANDOMIZE_MAX_OFFSET, SLOT_FLOOR_CAP, align_up,
};
use boot_info::{BootParams, LoadFlags, MemoryRegion, cmdline};
use log::{debug, info, warn};

use crate::MappingService;
use crate::avoid::AvoidanceSet;
use crate::slots::{SlotTable, slot_count};

/// Where the decompressed image goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePlacement {
    /// Physical load address. The default output address when randomization
    /// is off or found no slot.
    pub physical: u64,
    /// Virtual slide of the kernel mapping, drawn independently of the
    /// physical address.
    pub virtual_offset: u64,
    /// Whether randomization ran for this boot.
    pub randomized: bool,
}

#[cfg(not(feature = "hibernate"))]
fn randomization_enabled(params: &BootParams) -> bool {
    !cmdline::has_flag(params, "nokaslr")
}

/// Hibernation resume must find the kernel at the address the image was
/// written from, so randomization waits for an explicit request.
#[cfg(feature = "hibernate")]
fn randomization_enabled(params: &BootParams) -> bool {
    cmdline::has_flag(params, "kaslr")
}

/// Pick the physical load address and the virtual slide for this boot.
///
/// When the command line disables randomization the defaults come back
/// unchanged and the boot parameters are left untouched. Otherwise the
/// [`LoadFlags::LAYOUT_RANDOMIZED`] flag is set, the avoidance catalog is
/// built (pre-mapping what the stage keeps using), and both draws run. A
/// physical target other than `output` is mapped and the mapping switched
/// in before returning, so the caller may decompress straight to it.
///
/// # Errors
///
/// Fails when the identity mapping runs out of page-table scratch space
/// while covering a range.
pub fn choose_image_location<R: Rng, M: MappingService>(
    params: &mut BootParams,
    input: MemoryRegion,
    output: u64,
    image_size: u64,
    rng: &mut R,
    mapping: &mut M,
) -> Result<ImagePlacement, MapError> {
    if !randomization_enabled(params) {
        info!("layout randomization disabled on the command line");
        return Ok(ImagePlacement {
            physical: output,
            virtual_offset: LOAD_PHYSICAL_ADDR,
            randomized: false,
        });
    }

    params.loadflags.insert(LoadFlags::LAYOUT_RANDOMIZED);

    let avoid = AvoidanceSet::init(params, input, output, mapping)?;

    // A loader that placed us high must not drag the whole search window
    // up with it.
    let floor = output.min(SLOT_FLOOR_CAP);
    let physical = match choose_physical(params, &avoid, floor, image_size, rng) {
        Some(addr) => addr,
        None => {
            warn!("no usable slot in the firmware map, keeping the default target");
            output
        }
    };

    if physical != output {
        mapping.cover(MemoryRegion::new(physical, image_size))?;
        // SAFETY: the new target was just covered and everything the stage
        // still touches was covered while building the catalog.
        unsafe { mapping.activate() };
    }

    let virtual_offset = choose_virtual(LOAD_PHYSICAL_ADDR, image_size, rng);
    info!("image placed at {physical:#x}, virtual slide {virtual_offset:#x}");

    Ok(ImagePlacement {
        physical,
        virtual_offset,
        randomized: true,
    })
}

/// Scan every usable firmware range above `floor` and draw one aligned
/// physical address, or `None` when no range holds the image.
pub fn choose_physical<R: Rng>(
    params: &BootParams,
    avoid: &AvoidanceSet<'_>,
    floor: u64,
    image_size: u64,
    rng: &mut R,
) -> Option<u64> {
    let mut slots = SlotTable::new();
    for entry in params.mmap.entries() {
        if slots.is_full() {
            debug!("slot table full, ignoring the rest of the firmware map");
            break;
        }
        if !entry.is_usable_ram() {
            continue;
        }
        slots.scan_region(entry.region(), floor, image_size, avoid);
    }
    debug!(
        "{} slots across {} areas",
        slots.total_slots(),
        slots.areas().len()
    );
    slots.choose(rng)
}

/// Draw the virtual slide from `[align_up(min_addr), RANDOMIZE_MAX_OFFSET)`.
///
/// The virtual window is fixed and private to the kernel mapping, so the
/// avoidance catalog does not apply. A window too small to slide in
/// degrades to the aligned minimum rather than failing.
pub fn choose_virtual<R: Rng>(min_addr: u64, image_size: u64, rng: &mut R) -> u64 {
    let floor = align_up(min_addr, PHYSICAL_ALIGN);
    let window = RANDOMIZE_MAX_OFFSET.saturating_sub(floor);
    let slots = if window < image_size {
        1
    } else {
        u64::from(slot_count(window, image_size)).max(1)
    };
    floor + (rng.next_u64() % slots) * PHYSICAL_ALIGN
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRng(u64);

    impl Rng for FixedRng {
        fn next_u64(&mut self) -> u64 {
            self.0
        }
    }

    #[test]
    fn virtual_draw_spans_the_whole_window() {
        let last = (RANDOMIZE_MAX_OFFSET - LOAD_PHYSICAL_ADDR - 0x0080_0000) / PHYSICAL_ALIGN;
        let lowest = choose_virtual(LOAD_PHYSICAL_ADDR, 0x0080_0000, &mut FixedRng(0));
        let highest = choose_virtual(LOAD_PHYSICAL_ADDR, 0x0080_0000, &mut FixedRng(last));
        let wrapped = choose_virtual(LOAD_PHYSICAL_ADDR, 0x0080_0000, &mut FixedRng(last + 1));

        assert_eq!(lowest, LOAD_PHYSICAL_ADDR);
        assert_eq!(highest + 0x0080_0000, RANDOMIZE_MAX_OFFSET);
        assert_eq!(wrapped, lowest);
    }

    #[test]
    fn virtual_draw_degrades_to_the_floor_when_cramped() {
        // Image larger than the whole window.
        let min = RANDOMIZE_MAX_OFFSET - 2 * PHYSICAL_ALIGN;
        let offset = choose_virtual(min, 8 * PHYSICAL_ALIGN, &mut FixedRng(41));
        assert_eq!(offset, min);
    }

    #[test]
    fn virtual_draw_handles_an_unaligned_minimum() {
        let offset = choose_virtual(LOAD_PHYSICAL_ADDR + 1, PHYSICAL_ALIGN, &mut FixedRng(0));
        assert_eq!(offset, LOAD_PHYSICAL_ADDR + PHYSICAL_ALIGN);
    }
}
