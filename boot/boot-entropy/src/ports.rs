//! # x86 I/O Port Access
//!
//! Thin wrappers over `in`/`out` for the one legacy device this stage talks
//! to (the i8254 timer). Port-mapped only; never use these for MMIO.

/// Write one byte to an I/O port.
///
/// # Safety
/// Requires CPL0 (or I/O permission for `port`) and a device that actually
/// decodes `port`; a wrong write can wedge the device or the machine.
#[inline]
pub unsafe fn outb(port: u16, val: u8) {
    unsafe {
        core::arch::asm!("out dx, al", in("dx") port, in("al") val, options(nomem, nostack, preserves_flags));
    }
}

/// Read one byte from an I/O port.
///
/// # Safety
/// Requires CPL0 (or I/O permission for `port`); reading a port nothing
/// decodes yields garbage or stalls the device protocol.
#[inline]
pub unsafe fn inb(port: u16) -> u8 {
    let mut v: u8;
    unsafe {
        core::arch::asm!("in al, dx", in("dx") port, out("al") v, options(nomem, nostack, preserves_flags));
    }
    v
}
