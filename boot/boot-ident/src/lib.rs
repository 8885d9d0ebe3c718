//! # Early Identity Mapping
//!
//! A minimal x86-64 identity mapper for the stretch of boot that runs before
//! any real memory allocator exists. All page tables come from a fixed
//! in-crate arena of four 4 KiB tables; mappings are always 2 MiB leaves at
//! `virtual == physical`.
//!
//! ## Design
//!
//! - [`IdentityMap`] owns its [`ScratchPool`] by value. There is no frame
//!   allocator and no physical-to-virtual translation layer; the environment
//!   is identity-mapped, so a table's address is its pointer.
//! - Non-leaf entries record two things: the table's physical address for the
//!   MMU, and the pool slot of that table in the OS-available bits. Walks
//!   resolve the next level through the recorded slot, so the mapper never
//!   turns a stored address back into a reference.
//! - Running out of scratch tables is an error ([`MapError::PoolExhausted`]),
//!   not a panic. The caller decides whether that is fatal.
//!
//! ## Safety
//!
//! Everything except [`IdentityMap::activate`] is safe plain data
//! manipulation and runs (and is tested) on any host.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod entry;
mod map;
mod table;

pub use entry::{IdentEntry, Level};
pub use map::{IdentityMap, MapError};
pub use table::{IdentTable, SCRATCH_TABLES, ScratchPool};
