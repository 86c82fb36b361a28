/// Total atomic units ever to be emitted. Chosen as `u64::MAX`, the same
/// "emit against the full unsigned range" convention the original uses
/// via its own money-supply constant.
pub const MONEY_SUPPLY: u128 = u64::MAX as u128;

/// Controls emission decay speed: each block pays out
/// `(MONEY_SUPPLY - alreadyGenerated) >> EMISSION_SPEED_FACTOR`.
pub const EMISSION_SPEED_FACTOR: u32 = 20;

/// The unpenalized coinbase reward for a block, given how many atomic
/// units the chain has emitted up to (not including) it. Grounded on the
/// standard CryptoNote emission curve: reward shrinks geometrically as
/// `alreadyGeneratedCoins` approaches `MONEY_SUPPLY`.
pub fn base_reward(already_generated_coins: u128) -> u64 {
    let remaining = MONEY_SUPPLY.saturating_sub(already_generated_coins);
    (remaining >> EMISSION_SPEED_FACTOR) as u64
}

/// Applies the block-size penalty: no penalty at or below `median_size`,
/// decaying to zero at `2 * median_size`, per spec.md §4.2 rule 7's
/// `reward · (2·median − size)·size / median²` formula, computed in
/// 128-bit arithmetic to avoid overflow on the intermediate product.
pub fn penalize_reward(reward: u64, block_size: usize, median_size: usize) -> u64 {
    if median_size == 0 || block_size <= median_size {
        return reward;
    }
    if block_size >= median_size * 2 {
        return 0;
    }
    let reward = reward as u128;
    let size = block_size as u128;
    let median = median_size as u128;
    let numerator = reward * (2 * median - size) * size;
    let denominator = median * median;
    (numerator / denominator) as u64
}
