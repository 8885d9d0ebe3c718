//! # Boot-Stage Fault Recovery
//!
//! Minimal exception handling for the window between entering long mode and
//! handing control to the decompressed kernel. Two faults are survivable
//! here, everything else stops the machine with a reason on the log:
//!
//! - **#GP (vector 13)**: probing instructions are registered in a fixup
//!   table ([`FixupEntry`]). A fault on a registered instruction resumes at
//!   its landing point; any other #GP halts.
//! - **#PF (vector 14)**: a non-present supervisor access means the boot
//!   stage touched memory outside its identity mapping. The mapping is
//!   widened by one 2 MiB page and the instruction retries. Present, user,
//!   or reserved-bit faults halt.
//!
//! The decision logic ([`handle_protection_fault`], [`handle_page_fault`])
//! is plain data in, [`FaultOutcome`] out, and is tested on the host. The
//! [`platform`] module owns the naked entry stubs, the static
//! [`BootIdt`], and the glue that applies an outcome to the interrupt frame.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod fault;
mod fixup;
mod idt;
#[cfg(target_arch = "x86_64")]
pub mod platform;

pub use fault::{FaultOutcome, PageFaultError, handle_page_fault, handle_protection_fault};
pub use fixup::{FixupEntry, resolve_fixup};
pub use idt::{
    BOOT_IDT_ENTRIES, BootIdt, GateAttr, IdtEntry, PAGE_FAULT_VECTOR, PROTECTION_FAULT_VECTOR,
};
