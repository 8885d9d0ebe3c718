//! # Hardware Entropy Taps
//!
//! Three sources, in falling order of quality: the on-die hardware RNG, the
//! time-stamp counter, and the i8254 interval timer. The first two are gated
//! on CPUID capability bits; the timer is wired into every PC-compatible
//! machine and serves as the last resort.

use crate::cpuid::CpuFeatures;
#[cfg(target_arch = "x86_64")]
use crate::ports;
use log::debug;

/// One hardware entropy source.
pub trait EntropyTap {
    /// Short name for the boot log.
    fn name(&self) -> &'static str;

    /// Draw one sample, or `None` when the tap has nothing this time.
    fn sample(&mut self) -> Option<u64>;
}

/// The on-die hardware random number generator (`RDRAND`).
///
/// The DRNG can transiently run dry, so one sample retries a bounded number
/// of times before giving up for this draw.
pub struct HwRandom(());

/// Retries per sample before the DRNG is considered dry for this draw.
const RDRAND_RETRY_LOOPS: u32 = 10;

impl HwRandom {
    /// Available only when the CPU reports the instruction.
    #[must_use]
    pub const fn detect(features: CpuFeatures) -> Option<Self> {
        if features.hw_random {
            Some(Self(()))
        } else {
            None
        }
    }
}

impl EntropyTap for HwRandom {
    fn name(&self) -> &'static str {
        "hw-random"
    }

    fn sample(&mut self) -> Option<u64> {
        (0..RDRAND_RETRY_LOOPS).find_map(|_| rdrand_step())
    }
}

#[cfg(target_arch = "x86_64")]
fn rdrand_step() -> Option<u64> {
    let value: u64;
    let ok: u8;
    // SAFETY: execution is gated on the CPUID rdrand bit.
    unsafe {
        core::arch::asm!(
            "rdrand {value}",
            "setc {ok}",
            value = out(reg) value,
            ok = out(reg_byte) ok,
            options(nomem, nostack)
        );
    }
    (ok == 1).then_some(value)
}

#[cfg(not(target_arch = "x86_64"))]
fn rdrand_step() -> Option<u64> {
    None
}

/// The time-stamp counter (`RDTSC`), fenced so the read is not reordered.
pub struct CycleCounter(());

impl CycleCounter {
    /// Available only when the CPU reports a time-stamp counter.
    #[must_use]
    pub const fn detect(features: CpuFeatures) -> Option<Self> {
        if features.cycle_counter {
            Some(Self(()))
        } else {
            None
        }
    }
}

impl EntropyTap for CycleCounter {
    fn name(&self) -> &'static str {
        "cycle-counter"
    }

    fn sample(&mut self) -> Option<u64> {
        Some(rdtsc())
    }
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
#[allow(clippy::inline_always)]
fn rdtsc() -> u64 {
    let lo: u32;
    let hi: u32;
    unsafe {
        core::arch::asm!(
            "lfence", // serialize (Intel-recommended)
            "rdtsc",
            out("eax") lo,
            out("edx") hi,
            options(nomem, nostack, preserves_flags),
        );
    }
    (u64::from(hi) << 32) | u64::from(lo)
}

#[cfg(not(target_arch = "x86_64"))]
fn rdtsc() -> u64 {
    0
}

/// The i8254 interval timer, channel 0.
///
/// Read through the readback command so the count and its status latch
/// atomically; a set null-count status bit means the counter has not loaded
/// yet and the whole sequence must be retried.
pub struct IntervalTimer(());

#[cfg(target_arch = "x86_64")]
const PIT_CH0_DATA: u16 = 0x40;
#[cfg(target_arch = "x86_64")]
const PIT_CMD: u16 = 0x43;
/// Readback command: latch status and count for channel 0.
#[cfg(target_arch = "x86_64")]
const PIT_READBACK_CH0: u8 = 0xc0 | 0x02;
/// Status bit 6: the counter has no count loaded yet.
#[cfg(target_arch = "x86_64")]
const PIT_STATUS_NULL_COUNT: u8 = 1 << 6;

impl IntervalTimer {
    #[must_use]
    pub const fn new() -> Self {
        Self(())
    }
}

impl Default for IntervalTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropyTap for IntervalTimer {
    fn name(&self) -> &'static str {
        "interval-timer"
    }

    #[cfg(target_arch = "x86_64")]
    fn sample(&mut self) -> Option<u64> {
        let timer = loop {
            // SAFETY: standard i8254 readback sequence, ring 0 only.
            unsafe {
                ports::outb(PIT_CMD, PIT_READBACK_CH0);
                let status = ports::inb(PIT_CH0_DATA);
                let lo = u16::from(ports::inb(PIT_CH0_DATA));
                let hi = u16::from(ports::inb(PIT_CH0_DATA));
                if status & PIT_STATUS_NULL_COUNT == 0 {
                    break (hi << 8) | lo;
                }
            }
        };
        Some(u64::from(timer))
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn sample(&mut self) -> Option<u64> {
        None
    }
}

/// The taps one boot attempt owns, detected once.
pub struct EntropySources {
    hw: Option<HwRandom>,
    cycles: Option<CycleCounter>,
    timer: IntervalTimer,
}

impl EntropySources {
    /// Probe the CPU and keep whichever taps it offers.
    #[must_use]
    pub fn detect() -> Self {
        let features = CpuFeatures::read();
        let sources = Self {
            hw: HwRandom::detect(features),
            cycles: CycleCounter::detect(features),
            timer: IntervalTimer::new(),
        };
        debug!(
            "entropy taps: hw-random={} cycle-counter={} interval-timer=fallback",
            sources.hw.is_some(),
            sources.cycles.is_some(),
        );
        sources
    }

    /// Borrow the taps as a mixer input set: the preferred taps in priority
    /// order plus the always-present timer fallback.
    pub fn rng(&mut self, seed: u64) -> crate::BootRng<'_> {
        let Self { hw, cycles, timer } = self;
        crate::BootRng::new(
            seed,
            [
                hw.as_mut().map(|tap| tap as &mut dyn EntropyTap),
                cycles.as_mut().map(|tap| tap as &mut dyn EntropyTap),
            ],
            timer,
        )
    }
}
