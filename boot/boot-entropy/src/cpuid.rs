//! # CPU Capability Probing
//!
//! One CPUID leaf 01h read gates which entropy taps exist. Only the bits
//! this stage consumes are named; everything else stays reserved.

use bitfield_struct::bitfield;

pub const LEAF_01H: u32 = 0x01;

/// Execute CPUID with the given leaf and subleaf.
///
/// # Safety
/// The CPUID instruction must be available and the leaf must exist.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
#[allow(unused_assignments, clippy::inline_always)]
pub unsafe fn cpuid(leaf: u32, subleaf: u32) -> CpuidResult {
    let (mut eax, mut ebx, mut ecx, mut edx) = (leaf, 0u32, subleaf, 0u32);
    unsafe {
        core::arch::asm!(
            "push rbx",
            "cpuid",
            "mov {ebx_out:e}, ebx", // move EBX to a free GPR we bind
            "pop rbx",
            ebx_out = lateout(reg) ebx,
            inlateout("eax") eax,
            inlateout("ecx") ecx,
            lateout("edx") edx,
            options(nomem, preserves_flags),
        );
    }
    CpuidResult { eax, ebx, ecx, edx }
}

#[derive(Debug, Copy, Clone)]
#[repr(C)]
pub struct CpuidResult {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

/// CPUID.01H:ECX feature flags (only the bits this stage reads).
///
/// Reference: Intel SDM Vol. 2A, Table 3-12 "Feature Information Returned
/// in ECX for CPUID(01H)".
#[bitfield(u32)]
pub struct Leaf1Ecx {
    #[bits(30)]
    _rsv0_29: u32,
    /// RDRAND instruction (hardware random number generator) is supported.
    rdrand: bool, // 30
    /// Hypervisor present (running under a hypervisor).
    hypervisor: bool, // 31
}

/// CPUID.01H:EDX feature flags (only the bits this stage reads).
///
/// Reference: Intel SDM Vol. 2A, Table 3-13 "Feature Information Returned
/// in EDX for CPUID(01H)".
#[bitfield(u32)]
pub struct Leaf1Edx {
    #[bits(4)]
    _rsv0_3: u8,
    /// Time-Stamp Counter (RDTSC) instruction available.
    tsc: bool, // 4
    #[bits(27)]
    _rsv5_31: u32,
}

/// The capability bits gating the entropy taps.
#[derive(Debug, Clone, Copy)]
pub struct CpuFeatures {
    pub hw_random: bool,
    pub cycle_counter: bool,
}

impl CpuFeatures {
    /// Read the feature bits from the processor.
    #[must_use]
    pub fn read() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            // SAFETY: leaf 01h exists on every 64-bit capable CPU.
            let leaf = unsafe { cpuid(LEAF_01H, 0) };
            Self {
                hw_random: Leaf1Ecx::from_bits(leaf.ecx).rdrand(),
                cycle_counter: Leaf1Edx::from_bits(leaf.edx).tsc(),
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        Self {
            hw_random: false,
            cycle_counter: false,
        }
    }

    /// No capabilities at all; taps then degrade to the timer fallback.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            hw_random: false,
            cycle_counter: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_bits_sit_at_documented_positions() {
        assert!(Leaf1Ecx::from_bits(1 << 30).rdrand());
        assert!(!Leaf1Ecx::from_bits(!(1 << 30)).rdrand());
        assert!(Leaf1Edx::from_bits(1 << 4).tsc());
        assert!(!Leaf1Edx::from_bits(!(1 << 4)).tsc());
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn leaf_1_reads_without_faulting() {
        // CPUID is unprivileged; just exercise the asm path.
        let leaf = unsafe { cpuid(LEAF_01H, 0) };
        // Stepping/model/family of 0 across all registers would mean the
        // read never happened.
        assert!(leaf.eax != 0);
    }
}
