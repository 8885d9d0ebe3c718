//! # Boot Interrupt Descriptor Table
//!
//! A 15-entry IDT: just enough vectors to cover the CPU exceptions through
//! #PF (vector 14), which is the highest one the boot stage handles. Gates
//! default to non-present; only #GP and #PF ever get handlers, so any other
//! exception escalates instead of wandering into uninitialized code.
//!
//! Entry layout is the 16-byte x86-64 gate descriptor per the Intel SDM,
//! “Interrupt Descriptor Table”. The two packed attribute bytes (IST +
//! type/attrs) go through [`GateAttr`]; the rest stays `repr(C)` to keep
//! offsets obvious.

use bitfield_struct::bitfield;
use core::mem::size_of;
use core::ops::{Index, IndexMut};

/// #GP, general protection fault.
pub const PROTECTION_FAULT_VECTOR: usize = 0x0D; // 13
/// #PF, page fault.
pub const PAGE_FAULT_VECTOR: usize = 0x0E; // 14

/// Vectors the boot IDT describes: 0 through #PF inclusive.
pub const BOOT_IDT_ENTRIES: usize = PAGE_FAULT_VECTOR + 1;

// An IDT entry must be 16 bytes, and the table 16-byte aligned for the
// `lidt` limit calculation and common conventions.
const _: () = assert!(size_of::<IdtEntry>() == 16);
const _: () = assert!(align_of::<BootIdt>() == 16);

/// Two bytes of an IDT entry that pack:
///
/// - **low byte**: `IST` (3 bits) + 5 reserved zero bits
/// - **high byte**: `| P | DPL(2) | S(0) | Type(4) |`
///
/// On little-endian x86-64, this maps cleanly to a `u16`.
#[bitfield(u16)]
pub struct GateAttr {
    /// IST index (0 disables stack switching; the boot stage has one stack).
    #[bits(3)]
    pub ist: u8,

    /// Must be zero (hardware-reserved).
    #[bits(5)]
    __zero0: u8,

    /// Type: 0xE = interrupt gate, 0xF = trap gate.
    #[bits(4)]
    pub typ: u8,

    /// S bit (must be `0` for interrupt/trap gates).
    #[bits(1)]
    pub s: bool,

    /// DPL; always 0 here, nothing runs above CPL0 before the kernel.
    #[bits(2)]
    pub dpl: u8,

    /// Present bit. Must be `1` for a valid entry.
    #[bits(1)]
    pub present: bool,
}

impl GateAttr {
    /// An interrupt gate (type 0xE, S=0): masks IF on entry, which keeps the
    /// fault handlers non-reentrant.
    #[inline]
    #[must_use]
    pub const fn interrupt_gate() -> Self {
        Self::new().with_typ(0xE).with_s(false)
    }
}

/// One 16-byte x86-64 IDT gate descriptor.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct IdtEntry {
    offset_lo: u16,
    selector: u16,
    /// Two bytes packed via [`GateAttr`] (IST + type/attrs).
    ist_type: u16,
    offset_mid: u16,
    offset_hi: u32,
    zero: u32,
}

impl IdtEntry {
    /// A zeroed, non-present entry.
    pub const MISSING: Self = Self {
        offset_lo: 0,
        selector: 0,
        ist_type: GateAttr::new().into_bits(),
        offset_mid: 0,
        offset_hi: 0,
        zero: 0,
    };

    /// Store a handler address and return a fluent builder.
    ///
    /// The selector defaults to the current CS; the entry is not marked
    /// present until [`IdtEntryBuilder::present`] says so.
    #[allow(clippy::cast_possible_truncation)]
    pub fn set_handler(&mut self, handler: extern "C" fn()) -> IdtEntryBuilder<'_> {
        let addr = handler as u64;
        self.offset_lo = (addr & 0xFFFF) as u16;
        self.offset_mid = ((addr >> 16) & 0xFFFF) as u16;
        self.offset_hi = (addr >> 32) as u32;
        self.selector = current_cs();
        self.ist_type = GateAttr::interrupt_gate()
            .with_present(false)
            .with_dpl(0)
            .with_ist(0)
            .into_bits();

        IdtEntryBuilder { entry: self }
    }

    #[cfg(test)]
    fn offset(&self) -> u64 {
        u64::from(self.offset_lo)
            | (u64::from(self.offset_mid) << 16)
            | (u64::from(self.offset_hi) << 32)
    }
}

/// Fluent builder for an [`IdtEntry`].
pub struct IdtEntryBuilder<'a> {
    entry: &'a mut IdtEntry,
}

impl IdtEntryBuilder<'_> {
    /// Set the Present bit. Must be `true` for a usable gate.
    #[inline]
    pub const fn present(self, p: bool) -> Self {
        let bf = GateAttr::from_bits(self.entry.ist_type).with_present(p);
        self.entry.ist_type = bf.into_bits();
        self
    }

    /// Make this an interrupt gate (type 0xE, `S=0`).
    #[inline]
    pub const fn gate_interrupt(self) -> Self {
        let bf = GateAttr::from_bits(self.entry.ist_type)
            .with_typ(0xE)
            .with_s(false);
        self.entry.ist_type = bf.into_bits();
        self
    }
}

/// The boot-stage IDT: [`BOOT_IDT_ENTRIES`] gates, 16-byte aligned.
#[repr(C, align(16))]
pub struct BootIdt {
    entries: [IdtEntry; BOOT_IDT_ENTRIES],
}

impl BootIdt {
    /// A cleared table, every gate non-present.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [IdtEntry::MISSING; BOOT_IDT_ENTRIES],
        }
    }

    /// Load this IDT into the CPU's IDTR using `lidt`.
    ///
    /// # Safety
    /// - Must be called at CPL0.
    /// - All present entries must reference valid handler code.
    /// - Exceptions above vector 14 will fault on the short limit; nothing
    ///   past #PF may fire while this table is live.
    #[cfg(target_arch = "x86_64")]
    pub unsafe fn load(&'static self) {
        let idtr = Idtr {
            limit: (size_of::<Self>() - 1) as u16,
            base: core::ptr::from_ref(self) as u64,
        };
        unsafe {
            core::arch::asm!(
                "lidt [{}]",
                in(reg) &raw const idtr,
                options(nostack, preserves_flags, readonly)
            );
        }
    }
}

impl Default for BootIdt {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for BootIdt {
    type Output = IdtEntry;
    fn index(&self, i: usize) -> &Self::Output {
        &self.entries[i]
    }
}

impl IndexMut<usize> for BootIdt {
    fn index_mut(&mut self, i: usize) -> &mut Self::Output {
        &mut self.entries[i]
    }
}

/// Operand format used by `lidt` (limit + base).
#[cfg(target_arch = "x86_64")]
#[repr(C, packed)]
struct Idtr {
    limit: u16,
    base: u64,
}

/// Read the current CS selector (the default for new entries).
#[cfg(target_arch = "x86_64")]
#[inline]
fn current_cs() -> u16 {
    let cs: u16;
    unsafe {
        core::arch::asm!("mov {0:x}, cs", out(reg) cs, options(nomem, nostack, preserves_flags));
    }
    cs
}

/// Host stand-in: the flat code selector a stock loader GDT uses.
#[cfg(not(target_arch = "x86_64"))]
fn current_cs() -> u16 {
    0x10
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn probe_handler() {}

    #[test]
    fn new_table_is_entirely_non_present() {
        let idt = BootIdt::new();
        for i in 0..BOOT_IDT_ENTRIES {
            assert!(!GateAttr::from_bits(idt[i].ist_type).present());
        }
    }

    #[test]
    fn set_handler_packs_the_offset_and_gate_bits() {
        let mut idt = BootIdt::new();
        idt[PAGE_FAULT_VECTOR]
            .set_handler(probe_handler)
            .present(true)
            .gate_interrupt();

        let entry = idt[PAGE_FAULT_VECTOR];
        assert_eq!(entry.offset(), probe_handler as u64);

        let attr = GateAttr::from_bits(entry.ist_type);
        assert!(attr.present());
        assert_eq!(attr.typ(), 0xE);
        assert!(!attr.s());
        assert_eq!(attr.dpl(), 0);
        assert_eq!(attr.ist(), 0);
        assert_eq!(entry.selector, current_cs());
    }

    #[test]
    fn unrelated_vectors_stay_missing() {
        let mut idt = BootIdt::new();
        idt[PROTECTION_FAULT_VECTOR]
            .set_handler(probe_handler)
            .present(true)
            .gate_interrupt();

        assert!(!GateAttr::from_bits(idt[0].ist_type).present());
        assert!(!GateAttr::from_bits(idt[PAGE_FAULT_VECTOR].ist_type).present());
    }
}
