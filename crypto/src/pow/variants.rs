/// Which CryptoNight long-hash family a block's proof-of-work was produced
/// with. Selected from the block's major version (or, once soft-shell
/// activates, from the block height), never guessed at verification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoNightVariant {
    V0,
    V1,
    V2,
    SoftShell,
}

/// The scratchpad size and iteration count a long-hash run uses. Fixed for
/// V0/V1/V2; recomputed per height for [`CryptoNightVariant::SoftShell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptoNightParams {
    pub scratchpad_bytes: usize,
    pub iterations: usize,
}

pub const CN_PAGE_SIZE: usize = 2_097_152;
pub const CN_ITERATIONS: usize = 1_048_576;

const CN_SOFT_SHELL_MEMORY: u64 = 262_144;
const CN_SOFT_SHELL_WINDOW: u64 = 2_048;
const CN_SOFT_SHELL_MULTIPLIER: u64 = 3;
const CN_SOFT_SHELL_ITER: u64 = CN_SOFT_SHELL_MEMORY / 2;
const CN_SOFT_SHELL_PAD_MULTIPLIER: u64 = CN_SOFT_SHELL_WINDOW / CN_SOFT_SHELL_MULTIPLIER;
const CN_SOFT_SHELL_ITER_MULTIPLIER: u64 = CN_SOFT_SHELL_PAD_MULTIPLIER / 2;

impl CryptoNightVariant {
    /// Resolves the variant a block header must have been mined with, from
    /// its major version and (once active) height. Mirrors the original
    /// daemon's per-major-version hash selection: v1 -> V0, v2/v3 -> V1,
    /// v4+ -> V2, with soft-shell replacing V2 from `soft_shell_active_from`
    /// onward.
    pub fn for_block(major_version: u8, height: u64, soft_shell_active_from: Option<u64>) -> Self {
        if let Some(activation) = soft_shell_active_from {
            if height >= activation {
                return CryptoNightVariant::SoftShell;
            }
        }
        match major_version {
            0 | 1 => CryptoNightVariant::V0,
            2 | 3 => CryptoNightVariant::V1,
            _ => CryptoNightVariant::V2,
        }
    }

    /// Computes the scratchpad/iteration parameters for this variant at
    /// `height`. Only [`CryptoNightVariant::SoftShell`] depends on height;
    /// see `original_source/lib/Crypto/Hash.h`'s `cnSoftShellSlowHashV0` for
    /// the oscillation this reproduces.
    pub fn params(&self, height: u64) -> CryptoNightParams {
        match self {
            CryptoNightVariant::V0 | CryptoNightVariant::V1 | CryptoNightVariant::V2 => {
                CryptoNightParams { scratchpad_bytes: CN_PAGE_SIZE, iterations: CN_ITERATIONS }
            },
            CryptoNightVariant::SoftShell => soft_shell_params(height),
        }
    }
}

fn soft_shell_params(height: u64) -> CryptoNightParams {
    let base_offset = height % CN_SOFT_SHELL_WINDOW;
    let raw_offset = (height % (CN_SOFT_SHELL_WINDOW * 2)) as i64 - (base_offset as i64 * 2);
    let offset = if raw_offset < 0 { base_offset as i64 } else { raw_offset };

    let scratchpad = CN_SOFT_SHELL_MEMORY as i64 + offset * CN_SOFT_SHELL_PAD_MULTIPLIER as i64;
    let scratchpad = ((scratchpad / 128) * 128) as usize;
    let iterations = (CN_SOFT_SHELL_ITER as i64 + offset * CN_SOFT_SHELL_ITER_MULTIPLIER as i64) as usize;

    CryptoNightParams { scratchpad_bytes: scratchpad, iterations }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn major_version_selects_expected_variant() {
        assert_eq!(CryptoNightVariant::for_block(1, 100, None), CryptoNightVariant::V0);
        assert_eq!(CryptoNightVariant::for_block(2, 100, None), CryptoNightVariant::V1);
        assert_eq!(CryptoNightVariant::for_block(3, 100, None), CryptoNightVariant::V1);
        assert_eq!(CryptoNightVariant::for_block(4, 100, None), CryptoNightVariant::V2);
        assert_eq!(CryptoNightVariant::for_block(9, 100, None), CryptoNightVariant::V2);
    }

    #[test]
    fn soft_shell_activation_height_overrides_major_version() {
        assert_eq!(CryptoNightVariant::for_block(4, 5_000, Some(5_000)), CryptoNightVariant::SoftShell);
        assert_eq!(CryptoNightVariant::for_block(4, 4_999, Some(5_000)), CryptoNightVariant::V2);
    }

    #[test]
    fn fixed_variants_use_standard_page_size() {
        let params = CryptoNightVariant::V2.params(123_456);
        assert_eq!(params.scratchpad_bytes, CN_PAGE_SIZE);
        assert_eq!(params.iterations, CN_ITERATIONS);
    }

    #[test]
    fn soft_shell_params_stay_within_page_bounds() {
        for height in [0u64, 1, 2047, 2048, 4095, 10_000] {
            let params = CryptoNightVariant::SoftShell.params(height);
            assert!(params.scratchpad_bytes <= CN_PAGE_SIZE);
            assert!(params.scratchpad_bytes % 128 == 0);
            assert!(params.iterations > 0);
        }
    }

    #[test]
    fn soft_shell_params_oscillate_across_the_window() {
        let a = CryptoNightVariant::SoftShell.params(0);
        let b = CryptoNightVariant::SoftShell.params(1024);
        assert_ne!(a.scratchpad_bytes, b.scratchpad_bytes);
    }
}
