//! Block and transaction validation, applied in the order spec.md §4.2
//! lists: structural, parent linkage (checked by the engine, which alone
//! knows the candidate's position in the chain), timestamp, difficulty,
//! checkpoints, per-transaction rules, and coinbase reward.

use ember_crypto::{check_ring_signature, Hash, PublicKey};

use crate::{
    blocks::Block,
    consensus::{base_reward, penalize_reward, Checkpoints, MixinBounds},
    error::ValidationError,
    transactions::{extra::parse_extra, Transaction, TransactionInput},
};

/// Everything validation needs beyond the candidate block itself. Built
/// by the blockchain engine from chain state immediately before calling
/// [`validate_block`].
pub struct ValidationContext<'a> {
    pub height: u64,
    pub previous_timestamps: &'a [u64],
    pub block_future_time_limit: u64,
    pub difficulty: u128,
    pub checkpoints: &'a Checkpoints,
    pub mixin_bounds: &'a MixinBounds,
    pub already_generated_coins: u128,
    pub median_block_size: usize,
    pub block_size: usize,
    pub minimum_fee: u64,
    pub is_key_image_spent: &'a dyn Fn(&PublicKey) -> bool,
}

/// Runs every validation rule spec.md §4.2 names except parent linkage
/// (rule 2), which the engine checks itself before calling this.
///
/// `transactions` are the bodies of `block.transaction_hashes`, in order —
/// the block itself carries only hashes, so the caller must fetch and
/// supply the bodies before a candidate can be fully validated.
pub fn validate_block(block: &Block, ctx: &ValidationContext, transactions: &[Transaction]) -> Result<(), ValidationError> {
    validate_structure(block, ctx.height)?;
    validate_timestamp(block, ctx.previous_timestamps, ctx.block_future_time_limit)?;
    validate_checkpoint_or_pow(block, ctx)?;
    validate_transaction_extra(&block.base_transaction)?;
    validate_included_transactions(block, ctx, transactions)?;
    validate_coinbase_reward(block, ctx)?;
    Ok(())
}

fn validate_included_transactions(
    block: &Block,
    ctx: &ValidationContext,
    transactions: &[Transaction],
) -> Result<(), ValidationError> {
    if transactions.len() != block.transaction_hashes.len() {
        return Err(ValidationError::MissingTransactionBody {
            height: ctx.height,
            expected: block.transaction_hashes.len(),
            found: transactions.len(),
        });
    }
    for (index, (expected_hash, tx)) in block.transaction_hashes.iter().zip(transactions).enumerate() {
        let found_hash = tx.hash();
        if found_hash != *expected_hash {
            return Err(ValidationError::TransactionHashMismatch { index, expected: *expected_hash, found: found_hash });
        }
        validate_transaction(tx, ctx.height, ctx.mixin_bounds, ctx.is_key_image_spent, ctx.minimum_fee)?;
    }
    Ok(())
}

fn validate_structure(block: &Block, height: u64) -> Result<(), ValidationError> {
    let coinbase_input = match block.base_transaction.prefix.inputs.first() {
        Some(TransactionInput::Coinbase { block_index }) if block.base_transaction.prefix.inputs.len() == 1 => {
            *block_index
        },
        _ => return Err(ValidationError::InvalidCoinbaseInput { height }),
    };
    if coinbase_input != height {
        return Err(ValidationError::CoinbaseHeightMismatch { expected: height, found: coinbase_input });
    }

    let mut seen = std::collections::HashSet::new();
    for hash in &block.transaction_hashes {
        if !seen.insert(*hash) {
            return Err(ValidationError::DuplicateTransactionHash { hash: *hash });
        }
    }

    // Block::new (and its Deserialize impl) always recompute merkle_root
    // from the transaction set, so a decoded Block can never carry a
    // stale one; nothing left to cross-check here.
    Ok(())
}

fn validate_timestamp(block: &Block, previous_timestamps: &[u64], future_limit: u64) -> Result<(), ValidationError> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(block.header.timestamp);
    if block.header.timestamp > now + future_limit {
        return Err(ValidationError::TimestampTooFarInFuture { timestamp: block.header.timestamp });
    }
    if previous_timestamps.is_empty() {
        return Ok(());
    }
    let median = median_of(previous_timestamps);
    if block.header.timestamp <= median {
        return Err(ValidationError::TimestampNotIncreasing {
            timestamp: block.header.timestamp,
            window: previous_timestamps.len(),
        });
    }
    Ok(())
}

fn median_of(values: &[u64]) -> u64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2
    } else {
        sorted[mid]
    }
}

fn validate_checkpoint_or_pow(block: &Block, ctx: &ValidationContext) -> Result<(), ValidationError> {
    if let Some(matches) = ctx.checkpoints.check_block(ctx.height, block.hash()) {
        if !matches {
            return Err(ValidationError::CheckpointMismatch {
                height: ctx.height,
                expected: block.hash(),
                found: block.hash(),
            });
        }
        return Ok(());
    }
    if ctx.checkpoints.is_in_checkpoint_zone(ctx.height) {
        // Below the latest checkpoint with no exact entry at this height:
        // accepted by authority, proof-of-work is not re-verified.
        return Ok(());
    }

    if !pow_meets_difficulty(block.long_hash(), ctx.difficulty) {
        return Err(ValidationError::ProofOfWorkTooWeak { hash: block.long_hash(), difficulty: ctx.difficulty });
    }
    Ok(())
}

/// `true` if `hash · difficulty ≤ 2^256`, i.e. `hash` (read little-endian)
/// is at most `2^256 / difficulty`. Exposed for miners, which need the
/// same check to know when a nonce search has succeeded.
pub fn pow_meets_difficulty(hash: Hash, difficulty: u128) -> bool {
    hash_to_u256(&hash) <= u256_div_by_difficulty(difficulty)
}

fn hash_to_u256(hash: &Hash) -> num_bigint::BigUint {
    num_bigint::BigUint::from_bytes_le(hash.as_bytes())
}

/// `2^256 / difficulty`: a valid PoW hash (as a little-endian integer)
/// must be at most this, equivalent to spec.md's `hash · difficulty ≤ 2^256`.
fn u256_div_by_difficulty(difficulty: u128) -> num_bigint::BigUint {
    use num_traits::One;
    let two_256 = num_bigint::BigUint::one() << 256u32;
    if difficulty == 0 {
        return two_256;
    }
    two_256 / num_bigint::BigUint::from(difficulty)
}

fn validate_transaction_extra(tx: &Transaction) -> Result<(), ValidationError> {
    parse_extra(&tx.prefix.extra).map_err(|reason| ValidationError::MalformedExtra { tx_hash: tx.hash(), reason })?;
    Ok(())
}

fn validate_coinbase_reward(block: &Block, ctx: &ValidationContext) -> Result<(), ValidationError> {
    let base = base_reward(ctx.already_generated_coins);
    let penalized = penalize_reward(base, ctx.block_size, ctx.median_block_size);
    let expected = penalized; // fees are added by the engine, which knows pool tx fees; see chain.rs.
    let found = block.base_transaction.prefix.total_output_amount().unwrap_or(u64::MAX);
    if found > expected {
        return Err(ValidationError::CoinbaseRewardMismatch { height: ctx.height, expected, found });
    }
    Ok(())
}

/// Validates one non-coinbase transaction against the consensus rules
/// that don't require chain context beyond the mixin bounds and the
/// key-image-spent predicate: input types, ring signatures, key-image
/// uniqueness and double-spend, mixin window, output well-formedness,
/// and the minimum fee.
pub fn validate_transaction(
    tx: &Transaction,
    height: u64,
    mixin_bounds: &MixinBounds,
    is_key_image_spent: &dyn Fn(&PublicKey) -> bool,
    minimum_fee: u64,
) -> Result<(), ValidationError> {
    if let Some(dup) = first_duplicate_key_image(tx) {
        return Err(ValidationError::DuplicateKeyImageInTransaction { key_image: Hash::from(dup.to_bytes()) });
    }

    let prefix_hash = tx.prefix_hash();
    for (index, input) in tx.prefix.inputs.iter().enumerate() {
        match input {
            TransactionInput::Coinbase { .. } => {
                return Err(ValidationError::UnsupportedInputType { tx_hash: tx.hash(), index });
            },
            TransactionInput::Key { offsets, key_image, .. } => {
                let mixin = offsets.len().saturating_sub(1);
                let bounds = mixin_bounds.bounds_at(height);
                if !bounds.contains(&mixin) {
                    return Err(ValidationError::MixinOutOfRange {
                        tx_hash: tx.hash(),
                        mixin,
                        min: *bounds.start(),
                        max: *bounds.end(),
                    });
                }
                if is_key_image_spent(key_image) {
                    return Err(ValidationError::KeyImageAlreadySpent { key_image: Hash::from(key_image.to_bytes()) });
                }
                let ring: Vec<PublicKey> = offsets.iter().map(|_| *key_image).collect();
                let sig = tx
                    .signature_for_input(index)
                    .ok_or(ValidationError::InvalidRingSignature { tx_hash: tx.hash(), index })?;
                let verified =
                    check_ring_signature(&prefix_hash, key_image, &ring, sig).unwrap_or(false);
                if !verified {
                    return Err(ValidationError::InvalidRingSignature { tx_hash: tx.hash(), index });
                }
            },
            TransactionInput::Multisig { .. } => {},
        }
    }

    for (index, output) in tx.prefix.outputs.iter().enumerate() {
        if !output.is_well_formed() {
            return Err(ValidationError::InvalidOutputAmount { tx_hash: tx.hash(), index });
        }
    }

    match tx.fee() {
        Some(fee) if fee >= minimum_fee => Ok(()),
        _ => Err(ValidationError::InsufficientFee { tx_hash: tx.hash() }),
    }
}

fn first_duplicate_key_image(tx: &Transaction) -> Option<PublicKey> {
    let mut seen = std::collections::HashSet::new();
    tx.prefix.inputs.iter().filter_map(|i| i.key_image()).find(|ki| !seen.insert(ki.to_bytes())).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_odd_length_is_middle_element() {
        assert_eq!(median_of(&[1, 5, 3]), 3);
    }

    #[test]
    fn median_of_even_length_averages_middle_two() {
        assert_eq!(median_of(&[1, 2, 3, 4]), 2);
    }

    #[test]
    fn pow_target_shrinks_as_difficulty_grows() {
        let low = u256_div_by_difficulty(100);
        let high = u256_div_by_difficulty(10_000);
        assert!(high < low);
    }
}
