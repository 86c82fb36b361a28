//! LWMA-2 difficulty retargeting, in its three historical variants.
//! Grounded verbatim on `original_source/lib/CryptoNoteCore/Difficulty.cpp`
//! (`nextDifficultyV3/V4/V5`); the three differ only in window size,
//! clamp bounds and emergency-bump behavior.

/// Which LWMA-2 variant a block height retargets with. Selected by
/// block major version the same way [`ember_crypto::CryptoNightVariant`]
/// selects a hashing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifficultyVariant {
    V3,
    V4,
    V5,
}

impl DifficultyVariant {
    pub fn for_major_version(major_version: u8) -> Self {
        match major_version {
            0..=2 => DifficultyVariant::V3,
            3 => DifficultyVariant::V4,
            _ => DifficultyVariant::V5,
        }
    }
}

/// Parameters the three variants need; `window` is `DIFFICULTY_WINDOW`
/// for V5 or `DIFFICULTY_WINDOW_V1` for V3/V4, and `future_time_limit` is
/// only consulted by V3/V4 (V5 clamps solve time to a flat `[-4T, 6T]`
/// instead).
#[derive(Debug, Clone, Copy)]
pub struct DifficultyParams {
    pub target_seconds: i64,
    pub window: i64,
    pub future_time_limit: i64,
}

/// Computes the next block's difficulty from the last `window + 1`
/// timestamps and cumulative difficulties (oldest first). Returns a
/// fixed startup guess until the window has enough history, exactly as
/// the original does to bootstrap a fresh chain.
pub fn next_difficulty(
    variant: DifficultyVariant,
    params: DifficultyParams,
    timestamps: &[u64],
    cumulative_difficulties: &[u64],
) -> u64 {
    match variant {
        DifficultyVariant::V3 => next_difficulty_v3(params, timestamps, cumulative_difficulties),
        DifficultyVariant::V4 => next_difficulty_v4(params, timestamps, cumulative_difficulties),
        DifficultyVariant::V5 => next_difficulty_v5(params, timestamps, cumulative_difficulties),
    }
}

fn lwma_l_and_sum3(
    timestamps: &[u64],
    n: i64,
    target: i64,
    clamp_low: i64,
    clamp_high: i64,
) -> (i64, i64) {
    let mut l = 0i64;
    let mut sum3 = 0i64;
    for i in 1..=n {
        let idx = i as usize;
        let mut st = timestamps[idx] as i64 - timestamps[idx - 1] as i64;
        st = st.clamp(clamp_low, clamp_high);
        l += st * i;
        if i > n - 3 {
            sum3 += st;
        }
        let _ = target;
    }
    (l, sum3)
}

fn next_difficulty_v5(params: DifficultyParams, timestamps: &[u64], cumulative_difficulties: &[u64]) -> u64 {
    let n = params.window;
    if (timestamps.len() as i64) < n + 1 {
        return 50_000;
    }
    let t = params.target_seconds;
    let (l, sum3) = lwma_l_and_sum3(timestamps, n, t, -4 * t, 6 * t);

    let diff_span = cumulative_difficulties[n as usize] as i64 - cumulative_difficulties[0] as i64;
    let mut next_d = (diff_span * t * (n + 1) * 99) / (100 * 2 * l);
    let prev_d = cumulative_difficulties[n as usize] as i64 - cumulative_difficulties[(n - 1) as usize] as i64;

    next_d = next_d.clamp((prev_d * 67) / 100, (prev_d * 150) / 100);
    if sum3 < (8 * t) / 10 {
        next_d = next_d.max((prev_d * 108) / 100);
    }
    next_d.max(0) as u64
}

fn next_difficulty_v4(params: DifficultyParams, timestamps: &[u64], cumulative_difficulties: &[u64]) -> u64 {
    let n = params.window;
    if (timestamps.len() as i64) <= n {
        return 1_000;
    }
    let t = params.target_seconds;
    let ftl = params.future_time_limit;
    let (l, sum3) = lwma_l_and_sum3(timestamps, n, t, -ftl, 6 * t);

    let diff_span = cumulative_difficulties[n as usize] as i64 - cumulative_difficulties[0] as i64;
    let mut next_d = (diff_span * t * (n + 1) * 99) / (100 * 2 * l);
    let prev_d = cumulative_difficulties[n as usize] as i64 - cumulative_difficulties[(n - 1) as usize] as i64;

    next_d = next_d.clamp((prev_d * 67) / 100, (prev_d * 150) / 100);
    if sum3 < (8 * t) / 10 {
        next_d = next_d.max((prev_d * 110) / 100);
    }
    next_d.max(0) as u64
}

fn next_difficulty_v3(params: DifficultyParams, timestamps: &[u64], cumulative_difficulties: &[u64]) -> u64 {
    let n = params.window;
    if (timestamps.len() as i64) <= n {
        return 1_000;
    }
    let t = params.target_seconds;
    let ftl = params.future_time_limit;
    let (l, sum3) = lwma_l_and_sum3(timestamps, n, t, -ftl, 6 * t);

    let diff_span = cumulative_difficulties[n as usize] as i64 - cumulative_difficulties[0] as i64;
    let mut next_d = (diff_span * t * (n + 1) * 99) / (100 * 2 * l);
    let prev_d = cumulative_difficulties[n as usize] as i64 - cumulative_difficulties[(n - 1) as usize] as i64;

    next_d = next_d.clamp((prev_d * 70) / 100, (prev_d * 107) / 100);
    if sum3 < (8 * t) / 10 {
        next_d = (prev_d * 110) / 100;
    }
    next_d.max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady_window(n: usize, target: u64, base_difficulty: u64) -> (Vec<u64>, Vec<u64>) {
        let timestamps: Vec<u64> = (0..=n as u64).map(|i| i * target).collect();
        let cumulative: Vec<u64> = (0..=n as u64).map(|i| (i + 1) * base_difficulty).collect();
        (timestamps, cumulative)
    }

    #[test]
    fn v5_returns_startup_guess_with_insufficient_history() {
        let params = DifficultyParams { target_seconds: 120, window: 60, future_time_limit: 7200 };
        assert_eq!(next_difficulty(DifficultyVariant::V5, params, &[], &[]), 50_000);
    }

    #[test]
    fn v5_steady_state_is_near_previous_difficulty() {
        let params = DifficultyParams { target_seconds: 120, window: 60, future_time_limit: 7200 };
        let (timestamps, cumulative) = steady_window(60, 120, 10_000);
        let next = next_difficulty(DifficultyVariant::V5, params, &timestamps, &cumulative);
        let prev_d = cumulative[60] - cumulative[59];
        assert!(next >= prev_d * 67 / 100 && next <= prev_d * 150 / 100);
    }

    #[test]
    fn v3_emergency_bump_applies_on_fast_blocks() {
        let params = DifficultyParams { target_seconds: 120, window: 60, future_time_limit: 7200 };
        let n = 60usize;
        // Every solve time is 1 second: triggers the emergency clause.
        let timestamps: Vec<u64> = (0..=n as u64).collect();
        let cumulative: Vec<u64> = (0..=n as u64).map(|i| (i + 1) * 10_000).collect();
        let prev_d = cumulative[n] - cumulative[n - 1];
        let next = next_difficulty(DifficultyVariant::V3, params, &timestamps, &cumulative);
        assert_eq!(next, (prev_d * 110) / 100);
    }

    #[test]
    fn variant_selection_follows_major_version() {
        assert_eq!(DifficultyVariant::for_major_version(1), DifficultyVariant::V3);
        assert_eq!(DifficultyVariant::for_major_version(3), DifficultyVariant::V4);
        assert_eq!(DifficultyVariant::for_major_version(4), DifficultyVariant::V5);
    }
}
