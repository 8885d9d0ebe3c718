//! # Debug Console Output
//!
//! Byte-at-a-time logging over the classic 0xE9 debug I/O port, the only
//! output channel the decompression stage has before any real console
//! exists. Emulators and some chipsets forward writes to this port to the
//! host; on bare hardware without a listener the writes are harmless.
//!
//! Two front ends share the port sink:
//!
//! * [`DebugconLogger`] — a [`log::Log`] backend installed once during early
//!   init, carrying the usual `[LEVEL] target: message` lines.
//! * [`debugcon_print!`] — direct formatted output for paths that must not
//!   go through the logging framework (panic and halt paths).
//!
//! The whole crate body sits behind the `enabled` feature (on by default);
//! with the feature off, both front ends compile to no-ops and no port I/O
//! remains in the image.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::DebugconLogger;

#[cfg(feature = "enabled")]
#[doc(hidden)]
pub mod debugcon_fmt {
    use core::fmt::{self, Write};

    /// Port the debug console listens on.
    const DEBUGCON_PORT: u16 = 0xe9;

    /// Write a single byte to the debug console port.
    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn putb(b: u8) {
        #[cfg(target_arch = "x86_64")]
        // SAFETY: the debug port is output-only and side-effect free for the
        // guest; writing it cannot fault in ring 0.
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") DEBUGCON_PORT,
                in("al") b,
                options(nomem, preserves_flags)
            );
        }
        #[cfg(not(target_arch = "x86_64"))]
        let _ = b;
    }

    /// Unbuffered sink over the debug port.
    pub struct DebugconSink;

    impl Write for DebugconSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                putb(b);
            }
            Ok(())
        }

        #[inline]
        fn write_char(&mut self, c: char) -> fmt::Result {
            // UTF-8 encode without allocation.
            let mut buf = [0u8; 4];
            self.write_str(c.encode_utf8(&mut buf))
        }
    }

    #[doc(hidden)]
    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn debugcon_write(args: fmt::Arguments) {
        // Best-effort output; errors have nowhere to go anyway.
        let _ = fmt::write(&mut DebugconSink, args);
    }
}

#[cfg(not(feature = "enabled"))]
#[doc(hidden)]
pub mod debugcon_fmt {
    use core::fmt;

    #[doc(hidden)]
    #[inline(always)]
    pub fn debugcon_write(_: fmt::Arguments) {}
}

/// Print directly to the debug console, bypassing the `log` façade.
#[macro_export]
macro_rules! debugcon_print {
    ($($arg:tt)*) => {{
        $crate::debugcon_fmt::debugcon_write(core::format_args!($($arg)*));
    }};
}
