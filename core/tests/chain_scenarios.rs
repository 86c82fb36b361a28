//! End-to-end scenarios spanning `Blockchain` and `Mempool` together, the
//! way a node's orchestration layer drives them: alt-chain bookkeeping,
//! reorg-driven pool restoration, externally-tracked spent key images,
//! and proof-of-work rejection.

use ember_core::chain_storage::MemoryBackend;
use ember_core::consensus::{Checkpoints, MixinBounds};
use ember_core::difficulty::DifficultyParams;
use ember_core::error::{ChainStorageError, ValidationError};
use ember_core::test_helpers::{block_header, coinbase_transaction, genesis_block, keypair, next_block, spend_transaction};
use ember_core::{pow_meets_difficulty, AddBlockResult, Block, Blockchain, ChainParams, Mempool};

/// A window far wider than any test chain grows, so every block retargets
/// against the same fixed bootstrap difficulty instead of a moving LWMA
/// window — keeps cumulative-difficulty arithmetic predictable.
fn params() -> ChainParams {
    ChainParams {
        checkpoints: Checkpoints::new(),
        mixin_bounds: MixinBounds::new(u64::MAX),
        difficulty_params: DifficultyParams { target_seconds: 120, window: 1_000, future_time_limit: 7_200 },
        block_future_time_limit: 7_200,
        minimum_fee: 0,
        soft_shell_active_from: None,
        timestamp_check_window: 1_000,
    }
}

fn fresh_chain() -> (Blockchain<MemoryBackend>, Block) {
    let chain = Blockchain::new(MemoryBackend::new(), params()).unwrap();
    let genesis = genesis_block(0);
    assert_eq!(chain.add_block(genesis.clone(), vec![]).unwrap(), AddBlockResult::Added { height: 0 });
    (chain, genesis)
}

#[test]
fn alt_fork_with_lower_cumulative_difficulty_is_stored_but_does_not_become_tip() {
    let (chain, genesis) = fresh_chain();

    let difficulty = chain.next_difficulty(1) as u128;
    let main1 = next_block(&genesis, 1, 1_700_000_100, vec![], 0, difficulty);
    chain.add_block(main1.clone(), vec![]).unwrap();
    let main2 = next_block(&main1, 2, 1_700_000_200, vec![], 0, chain.next_difficulty(1) as u128);
    chain.add_block(main2.clone(), vec![]).unwrap();

    // A single alt block off genesis can never out-weigh two main blocks
    // mined at the same difficulty.
    let alt1 = next_block(&genesis, 1, 1_700_000_150, vec![], 0, chain.next_difficulty(1) as u128);
    let result = chain.add_block(alt1.clone(), vec![]).unwrap();
    assert_eq!(result, AddBlockResult::AddedToAltChain { height: 1 });

    assert_eq!(chain.top_hash(), Some(main2.hash()));
    assert_eq!(chain.height(), 3);
    // Stored, just not on the main chain.
    assert_eq!(chain.get_block_by_hash(&alt1.hash()).unwrap(), Some(alt1));
}

#[test]
fn heavier_alt_fork_reorganizes_and_pool_regains_evicted_transactions() {
    let (chain, genesis) = fresh_chain();
    let pool = Mempool::new(0);

    let (_, pubkey_a) = keypair(30);
    let (_, pubkey_b) = keypair(31);
    let tx_a = spend_transaction(21, pubkey_a, 100, 0);
    let tx_b = spend_transaction(22, pubkey_b, 100, 0);
    pool.push(tx_a.clone(), 1, &MixinBounds::new(u64::MAX), 1_000).unwrap();
    pool.push(tx_b.clone(), 2, &MixinBounds::new(u64::MAX), 1_000).unwrap();

    let main1 = next_block(&genesis, 1, 1_700_000_100, vec![tx_a.hash()], 0, chain.next_difficulty(1) as u128);
    chain.add_block(main1.clone(), vec![tx_a.clone()]).unwrap();
    pool.evict_committed(&main1.transaction_hashes, 1_000);

    let main2 = next_block(&main1, 2, 1_700_000_200, vec![tx_b.hash()], 0, chain.next_difficulty(1) as u128);
    chain.add_block(main2.clone(), vec![tx_b.clone()]).unwrap();
    pool.evict_committed(&main2.transaction_hashes, 1_000);

    assert!(pool.is_empty());

    // Three alt blocks off genesis accumulate more difficulty than the
    // two real main-chain blocks.
    let alt1 = next_block(&genesis, 1, 1_700_000_110, vec![], 0, chain.next_difficulty(1) as u128);
    assert_eq!(chain.add_block(alt1.clone(), vec![]).unwrap(), AddBlockResult::AddedToAltChain { height: 1 });
    let alt2 = next_block(&alt1, 2, 1_700_000_220, vec![], 0, chain.next_difficulty(1) as u128);
    assert_eq!(chain.add_block(alt2.clone(), vec![]).unwrap(), AddBlockResult::AddedToAltChain { height: 2 });
    let alt3 = next_block(&alt2, 3, 1_700_000_330, vec![], 0, chain.next_difficulty(1) as u128);

    let result = chain.add_block(alt3.clone(), vec![]).unwrap();
    let (evicted, evicted_transactions) = match result {
        AddBlockResult::ChainReorganized { split_height, new_height, evicted_blocks, evicted_transactions } => {
            assert_eq!(split_height, 1);
            assert_eq!(new_height, 3);
            (evicted_blocks, evicted_transactions)
        },
        other => panic!("expected a reorg, got {other:?}"),
    };
    assert_eq!(evicted.iter().map(Block::hash).collect::<Vec<_>>(), vec![main1.hash(), main2.hash()]);
    assert_eq!(evicted_transactions.iter().map(|tx| tx.hash()).collect::<Vec<_>>(), vec![tx_a.hash(), tx_b.hash()]);

    assert_eq!(chain.top_hash(), Some(alt3.hash()));
    assert_eq!(chain.height(), 4);

    // The engine itself surfaces the evicted bodies via `evicted_transactions`;
    // the pool just needs them handed back.
    pool.restore(evicted_transactions, 1_000);
    assert!(pool.contains(&tx_a.hash()));
    assert!(pool.contains(&tx_b.hash()));
}

#[test]
fn chain_tracks_externally_recorded_spent_key_images() {
    let (chain, _genesis) = fresh_chain();
    let (_, output_pubkey) = keypair(40);
    let tx = spend_transaction(41, output_pubkey, 100, 0);
    let key_image = *tx.prefix.inputs[0].key_image().expect("key input carries a key image");

    assert!(!chain.is_key_image_spent(&key_image));
    chain.record_spent_key_images(std::iter::once(&key_image));
    assert!(chain.is_key_image_spent(&key_image));
    chain.release_key_images(std::iter::once(&key_image));
    assert!(!chain.is_key_image_spent(&key_image));
}

#[test]
fn block_whose_hash_fails_the_difficulty_target_is_rejected() {
    let (chain, genesis) = fresh_chain();
    let difficulty = chain.next_difficulty(1) as u128;

    let (_, pubkey) = keypair(3);
    let coinbase = coinbase_transaction(1, 0, pubkey);
    let mut nonce = 0u32;
    let weak_block = loop {
        let header = block_header(1, 1_700_000_100, genesis.hash(), nonce);
        let block = Block::new(header, coinbase.clone(), vec![], 1, None);
        if !pow_meets_difficulty(block.long_hash(), difficulty) {
            break block;
        }
        nonce += 1;
    };

    let result = chain.add_block(weak_block, vec![]);
    assert!(matches!(
        result,
        Err(ChainStorageError::Validation(ValidationError::ProofOfWorkTooWeak { .. }))
    ));
    assert_eq!(chain.height(), 1);
}
