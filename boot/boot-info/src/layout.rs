//! # Placement Layout Constants
//!
//! Compile-time layout of the decompressed image. These mirror the values
//! the image was linked against; the const block below keeps them mutually
//! consistent.

/// Physical alignment every candidate load address must satisfy.
///
/// Also the large-page stride of the boot identity map, which is why a
/// placement aligned to it can always be covered by 2 MiB leaf entries.
pub const PHYSICAL_ALIGN: u64 = 0x0020_0000; // 2 MiB

/// Default physical load address of the decompressed image, used verbatim
/// when randomization is disabled or finds no usable slot.
pub const LOAD_PHYSICAL_ADDR: u64 = 0x0100_0000; // 16 MiB

/// Exclusive upper bound of the randomized virtual window. Virtual offsets
/// are drawn from `[LOAD_PHYSICAL_ADDR, RANDOMIZE_MAX_OFFSET)`.
pub const RANDOMIZE_MAX_OFFSET: u64 = 0x4000_0000; // 1 GiB

/// Cap on the slot-scan floor: the low end of the randomized range is the
/// smaller of the default load address and this line, so a loader that
/// placed the image high cannot push the whole search window up with it.
pub const SLOT_FLOOR_CAP: u64 = 0x2000_0000; // 512 MiB

/// Align `x` down to the nearest multiple of `a`.
///
/// `a` must be a non-zero power of two; no runtime check is performed.
#[inline(always)]
#[must_use]
pub const fn align_down(x: u64, a: u64) -> u64 {
    x & !(a - 1)
}

/// Align `x` up to the nearest multiple of `a`.
///
/// `a` must be a non-zero power of two and `x + (a - 1)` must not overflow;
/// no runtime check is performed.
#[inline(always)]
#[must_use]
pub const fn align_up(x: u64, a: u64) -> u64 {
    (x + a - 1) & !(a - 1)
}

const _: () = {
    assert!(PHYSICAL_ALIGN.is_power_of_two());
    assert!(LOAD_PHYSICAL_ADDR.is_multiple_of(PHYSICAL_ALIGN));
    assert!(SLOT_FLOOR_CAP.is_multiple_of(PHYSICAL_ALIGN));
    assert!(RANDOMIZE_MAX_OFFSET > LOAD_PHYSICAL_ADDR);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_next_multiple() {
        assert_eq!(align_up(0, PHYSICAL_ALIGN), 0);
        assert_eq!(align_up(1, PHYSICAL_ALIGN), PHYSICAL_ALIGN);
        assert_eq!(align_up(PHYSICAL_ALIGN, PHYSICAL_ALIGN), PHYSICAL_ALIGN);
        assert_eq!(align_up(PHYSICAL_ALIGN + 1, PHYSICAL_ALIGN), 2 * PHYSICAL_ALIGN);
    }

    #[test]
    fn align_down_truncates() {
        assert_eq!(align_down(PHYSICAL_ALIGN - 1, PHYSICAL_ALIGN), 0);
        assert_eq!(align_down(3 * PHYSICAL_ALIGN + 5, PHYSICAL_ALIGN), 3 * PHYSICAL_ALIGN);
    }
}
