//! # Fault Decisions
//!
//! The policy half of the trap path: given what the CPU reported, decide
//! what the stub should do. No statics, no I/O; the platform glue applies
//! the returned [`FaultOutcome`].

use crate::fixup::{FixupEntry, resolve_fixup};
use bitfield_struct::bitfield;

/// What the platform glue should do after a fault.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FaultOutcome {
    /// Rewrite the saved instruction pointer and `iretq`.
    Resume { ip: u64 },
    /// Identity-map the 2 MiB page containing `addr`, then retry the
    /// faulting instruction.
    ExtendMapping { addr: u64 },
    /// Unrecoverable; stop with this reason on the log.
    Halt(&'static str),
}

/// Page-fault error code layout (x86-64).
///
/// Each bit describes the condition that caused the page fault.
/// Reference: Intel SDM Vol. 3A, §6.15.1 “Page-Fault Exception (#PF)”.
#[bitfield(u64)]
pub struct PageFaultError {
    /// 0 = non-present page.
    /// 1 = protection violation (page present but access disallowed).
    pub present: bool, // bit 0

    /// 0 = read or execute.
    /// 1 = write access.
    pub write: bool, // bit 1

    /// 0 = supervisor (CPL 0–2).
    /// 1 = user mode (CPL 3).
    pub user: bool, // bit 2

    /// 1 = caused by reserved bit set in a paging structure.
    pub reserved_bit: bool, // bit 3

    /// 1 = instruction fetch (execute access).
    pub instruction_fetch: bool, // bit 4

    #[bits(59)]
    __: u64, // reserved / ignored bits
}

impl PageFaultError {
    /// Human-readable cause, used as the halt reason for fatal faults.
    #[must_use]
    pub const fn explain(&self) -> &'static str {
        if self.reserved_bit() {
            "reserved bit set in a paging structure"
        } else if self.user() {
            "user-mode access during the boot stage"
        } else if !self.present() {
            "access to a non-present page"
        } else if self.instruction_fetch() {
            "instruction fetch from a protected page"
        } else if self.write() {
            "write to a protected page"
        } else {
            "read from a protected page"
        }
    }
}

/// Decide the outcome of a #GP at `ip`.
///
/// Registered probe instructions resume at their landing point; anything
/// else is a real bug and halts.
#[must_use]
pub fn handle_protection_fault(fixups: &[FixupEntry], ip: u64) -> FaultOutcome {
    match resolve_fixup(fixups, ip) {
        Some(landing) => FaultOutcome::Resume { ip: landing },
        None => FaultOutcome::Halt("general protection fault without a fixup"),
    }
}

/// Decide the outcome of a #PF at `fault_addr`.
///
/// The only curable fault is a supervisor access to a non-present page with
/// clean reserved bits; that is the boot stage stepping outside its identity
/// mapping. Everything else halts.
#[must_use]
pub fn handle_page_fault(error: PageFaultError, fault_addr: u64) -> FaultOutcome {
    if error.present() || error.user() || error.reserved_bit() {
        return FaultOutcome::Halt(error.explain());
    }
    FaultOutcome::ExtendMapping { addr: fault_addr }
}
