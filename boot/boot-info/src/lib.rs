//! # Boot Stage Handover Data
//!
//! Shared data model of the decompression stage: the `#[repr(C)]`
//! boot-parameter block the loader hands over ([`params`]), the firmware
//! memory map, the half-open [`MemoryRegion`] used throughout placement, and
//! the layout constants the placement engine aligns against ([`layout`]).
//!
//! Pointer-carrying fields reference identity-mapped low memory set up by the
//! loader. The walk and lookup helpers here trust those pointers; see
//! [`params::BootParams`] for the contract.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod cmdline;
pub mod layout;
pub mod params;
pub mod region;

pub use params::{AuxRegions, BootParams, LoadFlags, MemoryMap, MemoryMapEntry, RegionKind};
pub use region::MemoryRegion;
