//! # Platform Glue
//!
//! The unsafe half of the trap path: naked entry stubs, the static IDT and
//! trap state, and the dispatchers that apply a [`FaultOutcome`] to the live
//! interrupt frame. Everything here assumes CPL0 on the boot CPU with
//! interrupts masked; nothing in this module is reentrant.

use crate::fault::{FaultOutcome, PageFaultError, handle_page_fault, handle_protection_fault};
use crate::fixup::FixupEntry;
use crate::idt::{BootIdt, PAGE_FAULT_VECTOR, PROTECTION_FAULT_VECTOR};
use boot_ident::IdentityMap;
use core::arch::naked_asm;
use log::{debug, error};

struct TrapState {
    fixups: &'static [FixupEntry],
    mapping: *mut IdentityMap,
}

static mut TRAP_STATE: TrapState = TrapState {
    fixups: &[],
    mapping: core::ptr::null_mut(),
};

static mut BOOT_IDT: BootIdt = BootIdt::new();

/// Wire up the boot fault path: remember the fixup table and the identity
/// mapper, install gates for #GP and #PF, and load the IDT.
///
/// # Safety
/// - Must run at CPL0 with interrupts masked, exactly once.
/// - `mapping` must stay valid for the rest of the boot stage; the page
///   fault path writes to it from interrupt context.
pub unsafe fn install(fixups: &'static [FixupEntry], mapping: &'static mut IdentityMap) {
    unsafe {
        TRAP_STATE = TrapState { fixups, mapping };
        #[allow(static_mut_refs)]
        {
            BOOT_IDT[PROTECTION_FAULT_VECTOR]
                .set_handler(protection_fault_stub)
                .present(true)
                .gate_interrupt();
            BOOT_IDT[PAGE_FAULT_VECTOR]
                .set_handler(page_fault_stub)
                .present(true)
                .gate_interrupt();
            BOOT_IDT.load();
        }
    }
    debug!("boot IDT loaded, {} fixup entries", fixups.len());
}

/// Log the reason and stop the CPU for good.
pub fn halt(reason: &'static str) -> ! {
    error!("boot stage halted: {reason}");
    loop {
        // Interrupts stay masked; hlt only wakes for NMI/SMI and re-halts.
        unsafe {
            core::arch::asm!("cli", "hlt", options(nomem, nostack));
        }
    }
}

/// #GP entry. The CPU pushed an error code; the dispatcher gets a pointer
/// to the saved RIP so a fixup can rewrite it in place before `iretq`.
#[unsafe(naked)]
extern "C" fn protection_fault_stub() {
    naked_asm!(
        // Caller-saved GPRs only; the boot target builds without SSE.
        "push rax",
        "push rcx",
        "push rdx",
        "push rsi",
        "push rdi",
        "push r8",
        "push r9",
        "push r10",
        "push r11",
        // 9 pushes on an aligned frame: pad to keep the call 16-byte aligned.
        "sub rsp, 8",
        // Saved RIP sits above the pad, the 9 GPRs, and the error code.
        "lea rdi, [rsp + 88]",
        "cld",
        "call {dispatch}",
        "add rsp, 8",
        "pop r11",
        "pop r10",
        "pop r9",
        "pop r8",
        "pop rdi",
        "pop rsi",
        "pop rdx",
        "pop rcx",
        "pop rax",
        // Drop the error code.
        "add rsp, 8",
        "iretq",
        dispatch = sym trap_protection_fault
    )
}

/// #PF entry. Passes CR2 and the pushed error code; a successful dispatch
/// returns and `iretq` retries the faulting instruction.
#[unsafe(naked)]
extern "C" fn page_fault_stub() {
    naked_asm!(
        "push rax",
        "push rcx",
        "push rdx",
        "push rsi",
        "push rdi",
        "push r8",
        "push r9",
        "push r10",
        "push r11",
        "sub rsp, 8",
        // rdi := faulting address, rsi := error code under the saved GPRs.
        "mov rdi, cr2",
        "mov rsi, [rsp + 80]",
        "cld",
        "call {dispatch}",
        "add rsp, 8",
        "pop r11",
        "pop r10",
        "pop r9",
        "pop r8",
        "pop rdi",
        "pop rsi",
        "pop rdx",
        "pop rcx",
        "pop rax",
        "add rsp, 8",
        "iretq",
        dispatch = sym trap_page_fault
    )
}

#[unsafe(no_mangle)]
extern "C" fn trap_protection_fault(saved_ip: *mut u64) {
    // SAFETY: the stub passes the address of the RIP slot in the live frame.
    let ip = unsafe { saved_ip.read() };
    let fixups = unsafe { (*&raw const TRAP_STATE).fixups };
    match handle_protection_fault(fixups, ip) {
        FaultOutcome::Resume { ip: landing } => unsafe { saved_ip.write(landing) },
        FaultOutcome::Halt(reason) => {
            error!("#GP at {ip:#x}");
            halt(reason);
        }
        FaultOutcome::ExtendMapping { .. } => halt("protection fault cannot extend mappings"),
    }
}

#[unsafe(no_mangle)]
extern "C" fn trap_page_fault(fault_addr: u64, error: u64) {
    let error = PageFaultError::from_bits(error);
    match handle_page_fault(error, fault_addr) {
        FaultOutcome::ExtendMapping { addr } => {
            // SAFETY: install() stored a mapper that outlives the boot stage.
            let mapping = unsafe { (*&raw mut TRAP_STATE).mapping.as_mut() };
            let Some(map) = mapping else {
                halt("page fault before the trap path was installed");
            };
            debug!("#PF at {addr:#x}, widening the identity mapping");
            if let Err(err) = map.extend(addr) {
                error!("#PF at {addr:#x}: {err}");
                halt("identity mapping cannot grow");
            }
        }
        FaultOutcome::Halt(reason) => {
            error!("#PF at {fault_addr:#x} err={:#x}", error.into_bits());
            halt(reason);
        }
        FaultOutcome::Resume { .. } => halt("page fault cannot resume by fixup"),
    }
}
