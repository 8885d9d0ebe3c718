//! # Boot-Time Entropy
//!
//! Best-effort random numbers for layout randomization, long before any real
//! RNG infrastructure exists. The seed is a rolling-XOR hash over a
//! build-identity string and the boot-parameter block; each draw folds in
//! whatever hardware sources the CPU offers and finishes with a fixed
//! multiplicative diffusion step.
//!
//! Hardware access is isolated behind the [`EntropyTap`] trait with three
//! capability-gated implementations (hardware RNG, cycle counter, interval
//! timer), so the mixing logic in [`BootRng`] stays hardware-agnostic and
//! testable with scripted taps.
//!
//! Not cryptographic: given a machine with none of the hardware taps, the
//! output is deterministic. The goal is defeating static layout guessing,
//! nothing more.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod cpuid;
mod rng;
mod taps;

#[cfg(target_arch = "x86_64")]
pub(crate) mod ports;

pub use cpuid::CpuFeatures;
pub use rng::{BootRng, Rng, boot_seed};
pub use taps::{CycleCounter, EntropySources, EntropyTap, HwRandom, IntervalTimer};
