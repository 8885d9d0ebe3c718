//! # Load-Address Randomization
//!
//! Picks where the decompressed kernel image lands, both physically and
//! virtually, before the decompressor runs. The physical address is drawn
//! from the slots the firmware memory map offers once every range the boot
//! stage still needs has been carved out; the virtual offset is drawn
//! independently over the fixed randomization window.
//!
//! ## Design
//!
//! Placement runs in three steps, one module each:
//!
//! * [`avoid`] catalogues the ranges a new image must not clobber (the
//!   working area of the stage itself, the ramdisk, the command line and
//!   the boot parameter block, plus the auxiliary list walked lazily).
//! * [`slots`] partitions each usable firmware range into aligned slots
//!   that dodge the catalog, and draws one slot uniformly.
//! * [`place`] wires the two together behind the command-line gate and
//!   reports the chosen [`place::ImagePlacement`].
//!
//! Moving the image needs page tables for the new target; the stage talks
//! to them through [`MappingService`] so the selection logic stays testable
//! on the host.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod avoid;
pub mod place;
pub mod slots;

pub use avoid::AvoidanceSet;
pub use place::{ImagePlacement, choose_image_location, choose_physical, choose_virtual};
pub use slots::{MAX_SLOT_AREAS, SlotArea, SlotTable};

use boot_ident::{IdentityMap, MapError};
use boot_info::MemoryRegion;

/// Page-table operations the placement stage relies on.
///
/// The identity mapper implements this for real; tests substitute a
/// recorder.
pub trait MappingService {
    /// Make every page of `region` reachable through the mapping.
    fn cover(&mut self, region: MemoryRegion) -> Result<(), MapError>;

    /// Switch the CPU onto the mapping.
    ///
    /// # Safety
    ///
    /// Every range the caller touches afterwards must have been covered
    /// first, including the code and stack executing the switch.
    unsafe fn activate(&self);
}

impl MappingService for IdentityMap {
    fn cover(&mut self, region: MemoryRegion) -> Result<(), MapError> {
        IdentityMap::cover(self, region)
    }

    unsafe fn activate(&self) {
        // SAFETY: forwarded contract; the caller vouches for coverage.
        unsafe { IdentityMap::activate(self) }
    }
}
