//! # Seeded Mixer
//!
//! Draws start from a boot-unique seed: a rotate-XOR hash over the build
//! identification string and the raw boot-parameter bytes, folded one aligned
//! 64-bit word at a time. Each draw XORs in whatever the preferred hardware
//! taps produce, falls back to the interval timer only when none of them
//! contributed, and finally runs a circular multiply so that weak low-order
//! entropy spreads across the whole word.
//!
//! None of this is cryptographic. It only has to make the chosen load
//! address hard to guess from the outside.

use crate::taps::EntropyTap;
use boot_info::BootParams;

/// Rotation applied before each word is folded in.
const SEED_ROTATION: u32 = u64::BITS - 7;

/// Odd multiplier for the diffusion step.
const MIX_CONST: u64 = 0x5d60_08cb_f384_8dd3;

/// Identifies this build of the loader; differs between rebuilds so that
/// otherwise identical machines do not share a seed baseline.
const BUILD_ID: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

fn rotate_xor(mut hash: u64, bytes: &[u8]) -> u64 {
    // Trailing bytes past the last aligned word carry no weight.
    for chunk in bytes.chunks_exact(8) {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        hash = hash.rotate_left(SEED_ROTATION) ^ u64::from_ne_bytes(word);
    }
    hash
}

/// Derive the seed for this boot from the build string and the firmware-filled
/// boot parameters.
#[must_use]
pub fn boot_seed(params: &BootParams) -> u64 {
    let hash = rotate_xor(0, BUILD_ID.as_bytes());
    rotate_xor(hash, params.as_bytes())
}

/// Circular multiply: low half plus high half of the widening product.
#[allow(clippy::cast_possible_truncation)]
fn diffuse(raw: u64) -> u64 {
    let product = u128::from(raw) * u128::from(MIX_CONST);
    let low = product as u64;
    let high = (product >> 64) as u64;
    low.wrapping_add(high)
}

/// A source of 64-bit draws.
pub trait Rng {
    fn next_u64(&mut self) -> u64;
}

/// The boot random number generator: one fixed seed plus live hardware taps.
///
/// Preferred taps are sampled in order and all successful samples are mixed
/// in. The fallback tap is consulted only when every preferred tap either is
/// absent or came up dry, so the coarse timer never dilutes better sources.
pub struct BootRng<'a> {
    seed: u64,
    preferred: [Option<&'a mut dyn EntropyTap>; 2],
    fallback: &'a mut dyn EntropyTap,
}

impl<'a> BootRng<'a> {
    pub fn new(
        seed: u64,
        preferred: [Option<&'a mut dyn EntropyTap>; 2],
        fallback: &'a mut dyn EntropyTap,
    ) -> Self {
        Self {
            seed,
            preferred,
            fallback,
        }
    }
}

impl Rng for BootRng<'_> {
    fn next_u64(&mut self) -> u64 {
        let mut raw = self.seed;
        let mut contributed = false;
        for tap in self.preferred.iter_mut().flatten() {
            if let Some(sample) = tap.sample() {
                raw ^= sample;
                contributed = true;
            }
        }
        if !contributed
            && let Some(sample) = self.fallback.sample()
        {
            raw ^= sample;
        }
        diffuse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boot_info::BootParams;

    struct ScriptedTap {
        samples: Vec<Option<u64>>,
        cursor: usize,
        calls: usize,
    }

    impl ScriptedTap {
        fn new(samples: Vec<Option<u64>>) -> Self {
            Self {
                samples,
                cursor: 0,
                calls: 0,
            }
        }
    }

    impl EntropyTap for ScriptedTap {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn sample(&mut self) -> Option<u64> {
            self.calls += 1;
            let sample = self.samples.get(self.cursor).copied().flatten();
            self.cursor += 1;
            sample
        }
    }

    struct CounterTap(u64);

    impl EntropyTap for CounterTap {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn sample(&mut self) -> Option<u64> {
            self.0 += 1;
            Some(self.0)
        }
    }

    #[test]
    fn rotate_xor_folds_one_word_per_step() {
        let word = 0x1122_3344_5566_7788_u64;
        assert_eq!(rotate_xor(0, &word.to_ne_bytes()), word);

        let mut two = [0u8; 16];
        two[..8].copy_from_slice(&word.to_ne_bytes());
        two[8..].copy_from_slice(&0xdead_beef_u64.to_ne_bytes());
        let expected = word.rotate_left(SEED_ROTATION) ^ 0xdead_beef;
        assert_eq!(rotate_xor(0, &two), expected);
    }

    #[test]
    fn rotate_xor_ignores_partial_tail() {
        let mut bytes = [0u8; 12];
        bytes[..8].copy_from_slice(&0xabcd_u64.to_ne_bytes());
        bytes[8..].copy_from_slice(&0xffff_ffff_u32.to_ne_bytes());
        assert_eq!(rotate_xor(0, &bytes), rotate_xor(0, &bytes[..8]));
    }

    #[test]
    fn boot_seed_is_stable_and_input_sensitive() {
        let mut params = BootParams::empty();
        params.init_size = 0x0400_0000;
        assert_eq!(boot_seed(&params), boot_seed(&params));

        // Flipping one aligned word flips the XOR term for that word, and
        // rotations never cancel a nonzero difference.
        let mut other = params.clone();
        other.init_size = 0x0800_0000;
        assert_ne!(boot_seed(&params), boot_seed(&other));
    }

    #[test]
    fn diffuse_matches_widening_multiply() {
        assert_eq!(diffuse(0), 0);
        assert_eq!(diffuse(1), MIX_CONST);
        let product = u128::from(u64::MAX) * u128::from(MIX_CONST);
        let expected = (product as u64).wrapping_add((product >> 64) as u64);
        assert_eq!(diffuse(u64::MAX), expected);
    }

    #[test]
    fn draws_mix_every_preferred_sample() {
        let mut first = ScriptedTap::new(vec![Some(0x1111)]);
        let mut second = ScriptedTap::new(vec![Some(0x2222)]);
        let mut fallback = ScriptedTap::new(vec![Some(0xffff)]);
        let seed = 0x5eed;

        let mut rng = BootRng::new(
            seed,
            [Some(&mut first), Some(&mut second)],
            &mut fallback,
        );
        let drawn = rng.next_u64();
        drop(rng);

        assert_eq!(drawn, diffuse(seed ^ 0x1111 ^ 0x2222));
        assert_eq!(fallback.calls, 0);
    }

    #[test]
    fn fallback_runs_only_when_preferred_taps_come_up_dry() {
        let mut dry = ScriptedTap::new(vec![None]);
        let mut fallback = ScriptedTap::new(vec![Some(0x4444)]);
        let seed = 0x5eed;

        let mut rng = BootRng::new(seed, [Some(&mut dry), None], &mut fallback);
        let drawn = rng.next_u64();
        drop(rng);

        assert_eq!(drawn, diffuse(seed ^ 0x4444));
        assert_eq!(fallback.calls, 1);
    }

    #[test]
    fn draws_without_any_tap_repeat_the_diffused_seed() {
        let mut fallback = ScriptedTap::new(vec![None, None]);
        let seed = 0x1234_5678_9abc_def0;

        let mut rng = BootRng::new(seed, [None, None], &mut fallback);
        assert_eq!(rng.next_u64(), diffuse(seed));
        assert_eq!(rng.next_u64(), diffuse(seed));
    }

    #[test]
    fn counter_driven_draws_spread_across_buckets() {
        const DRAWS: usize = 64_000;
        const BUCKETS: usize = 64;

        let mut counter = CounterTap(0x1000);
        let mut fallback = ScriptedTap::new(Vec::new());
        let mut rng = BootRng::new(
            0x8e03_55a7_c21b_4df9,
            [Some(&mut counter), None],
            &mut fallback,
        );

        let mut histogram = [0u32; BUCKETS];
        for _ in 0..DRAWS {
            histogram[(rng.next_u64() % BUCKETS as u64) as usize] += 1;
        }

        let expected = (DRAWS / BUCKETS) as f64;
        let chi_square: f64 = histogram
            .iter()
            .map(|&count| {
                let deviation = f64::from(count) - expected;
                deviation * deviation / expected
            })
            .sum();
        assert!(
            chi_square < 200.0,
            "bucket skew too large: chi-square {chi_square}"
        );
    }
}
