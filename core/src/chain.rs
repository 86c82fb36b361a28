//! The blockchain engine: accepts candidate blocks, tracks alternative
//! chains, and reorganizes the main chain when a heavier alt chain
//! appears, per spec.md §4.2's "Reorganization" paragraph.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use ember_crypto::{Hash, PublicKey};
use num_bigint::BigUint;
use num_traits::One;

use crate::{
    blocks::Block,
    chain_storage::BlockchainBackend,
    consensus::{base_reward, Checkpoints, MixinBounds},
    difficulty::{next_difficulty, DifficultyParams, DifficultyVariant},
    error::ChainStorageError,
    transactions::Transaction,
    validation::{validate_block, ValidationContext},
};

/// Outcome of [`Blockchain::add_block`], mirroring spec.md §4.2's four
/// dispositions for a submitted block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddBlockResult {
    Added { height: u64 },
    AddedToAltChain { height: u64 },
    /// `evicted_blocks` are the main-chain blocks the reorg replaced and
    /// `evicted_transactions` their non-coinbase bodies flattened in the
    /// same oldest-first order — the caller (typically the node's
    /// orchestration layer) is responsible for restoring them to the pool
    /// via [`crate::Mempool::restore`].
    ChainReorganized { split_height: u64, new_height: u64, evicted_blocks: Vec<Block>, evicted_transactions: Vec<Transaction> },
    AlreadyExists,
}

#[derive(Clone)]
struct ChainEntry {
    hash: Hash,
    timestamp: u64,
    cumulative_difficulty: u64,
    already_generated_coins: u128,
    block_size: usize,
}

#[derive(Clone)]
struct AltBlock {
    block: Block,
    transactions: Vec<Transaction>,
    height: u64,
    cumulative_difficulty: u64,
    already_generated_coins: u128,
}

/// Tunable consensus parameters the engine needs beyond what a single
/// block carries, gathered in one place so `Blockchain::new` doesn't take
/// an unwieldy argument list.
pub struct ChainParams {
    pub checkpoints: Checkpoints,
    pub mixin_bounds: MixinBounds,
    pub difficulty_params: DifficultyParams,
    pub block_future_time_limit: u64,
    pub minimum_fee: u64,
    pub soft_shell_active_from: Option<u64>,
    pub timestamp_check_window: usize,
}

pub struct Blockchain<B: BlockchainBackend> {
    backend: B,
    params: ChainParams,
    chain_index: RwLock<Vec<ChainEntry>>,
    alt_blocks: RwLock<HashMap<Hash, AltBlock>>,
    /// Key images confirmed on the main chain, kept current internally by
    /// [`Blockchain::validate_and_push_main`] and [`Blockchain::pop_top_block`]
    /// rather than by the caller.
    spent_key_images: RwLock<HashSet<[u8; 32]>>,
    /// Non-coinbase bodies of main-chain blocks, keyed by block hash.
    /// `Block` itself stores only transaction hashes, not bodies, so this
    /// cache is what lets a popped block's transactions be restored to the
    /// pool and its key images released. It only covers blocks pushed
    /// during this process's lifetime — a freshly opened backend has no
    /// entries until new blocks are validated in.
    committed_transactions: RwLock<HashMap<Hash, Vec<Transaction>>>,
}

impl<B: BlockchainBackend> Blockchain<B> {
    /// Opens the engine over an existing backend, rebuilding the in-memory
    /// chain index (timestamps and cumulative difficulties) it needs for
    /// difficulty retargeting and reorg comparisons. The index is a cache,
    /// never the source of truth — it can always be rebuilt from `backend`.
    pub fn new(backend: B, params: ChainParams) -> Result<Self, ChainStorageError> {
        let count = backend.get_block_count()?;
        let mut index = Vec::with_capacity(count as usize);
        let mut cumulative_difficulty = 0u64;
        let mut already_generated_coins = 0u128;
        for height in 0..count {
            let block = backend
                .get_block_by_index(height)?
                .ok_or(ChainStorageError::HeightNotFound(height))?;
            let difficulty_window = window_for(&index, params.difficulty_params, block.header.major_version);
            cumulative_difficulty += difficulty_window;
            let reward = block.base_transaction.prefix.total_output_amount().unwrap_or(0);
            already_generated_coins += reward as u128;
            index.push(ChainEntry {
                hash: block.hash(),
                timestamp: block.header.timestamp,
                cumulative_difficulty,
                already_generated_coins,
                block_size: block.base_transaction.serialized_size(),
            });
        }
        Ok(Blockchain {
            backend,
            params,
            chain_index: RwLock::new(index),
            alt_blocks: RwLock::new(HashMap::new()),
            spent_key_images: RwLock::new(HashSet::new()),
            committed_transactions: RwLock::new(HashMap::new()),
        })
    }

    /// Marks `key_images` as spent on the main chain.
    pub fn record_spent_key_images<'a>(&self, key_images: impl Iterator<Item = &'a PublicKey>) {
        let mut set = self.spent_key_images.write().unwrap_or_else(|p| p.into_inner());
        set.extend(key_images.map(|k| k.to_bytes()));
    }

    /// Releases `key_images`, e.g. after popping the block that spent them.
    pub fn release_key_images<'a>(&self, key_images: impl Iterator<Item = &'a PublicKey>) {
        let mut set = self.spent_key_images.write().unwrap_or_else(|p| p.into_inner());
        for ki in key_images {
            set.remove(&ki.to_bytes());
        }
    }

    pub fn is_key_image_spent(&self, key_image: &PublicKey) -> bool {
        self.spent_key_images.read().unwrap_or_else(|p| p.into_inner()).contains(&key_image.to_bytes())
    }

    pub fn height(&self) -> u64 {
        self.chain_index.read().unwrap_or_else(|p| p.into_inner()).len() as u64
    }

    pub fn top_hash(&self) -> Option<Hash> {
        self.chain_index.read().unwrap_or_else(|p| p.into_inner()).last().map(|e| e.hash)
    }

    pub fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, ChainStorageError> {
        if let Some(block) = self.backend.get_block_by_hash(hash)? {
            return Ok(Some(block));
        }
        Ok(self.alt_blocks.read().unwrap_or_else(|p| p.into_inner()).get(hash).map(|a| a.block.clone()))
    }

    pub fn get_block_by_height(&self, height: u64) -> Result<Option<Block>, ChainStorageError> {
        self.backend.get_block_by_index(height)
    }

    /// Pops the main chain's tip, restoring it to a freshly mined state;
    /// refuses to pop the genesis block. Returns the popped block and its
    /// non-coinbase transaction bodies, releasing their key images, so a
    /// caller (the pool, the P2P layer) can restore them.
    pub fn pop_top_block(&self) -> Result<(Block, Vec<Transaction>), ChainStorageError> {
        let mut index = self.chain_index.write().unwrap_or_else(|p| p.into_inner());
        if index.len() <= 1 {
            return Err(ChainStorageError::CannotPopGenesis);
        }
        let block = self.backend.pop_block()?.ok_or(ChainStorageError::CannotPopGenesis)?;
        index.pop();
        drop(index);

        let transactions =
            self.committed_transactions.write().unwrap_or_else(|p| p.into_inner()).remove(&block.hash()).unwrap_or_default();
        self.release_key_images(transactions.iter().flat_map(|tx| tx.prefix.inputs.iter().filter_map(|i| i.key_image())));
        Ok((block, transactions))
    }

    /// Height of `hash` on the main chain, if it is on the main chain at all.
    pub fn height_of(&self, hash: &Hash) -> Option<u64> {
        self.chain_index
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .position(|e| e.hash == *hash)
            .map(|pos| pos as u64)
    }

    /// Heights spaced exponentially back from the tip, the classic sparse
    /// chain request used to locate a fork point with a peer in `O(log n)`
    /// round trips rather than walking hash by hash.
    pub fn build_sparse_chain(&self) -> Vec<Hash> {
        let index = self.chain_index.read().unwrap_or_else(|p| p.into_inner());
        let mut hashes = Vec::new();
        if index.is_empty() {
            return hashes;
        }
        let mut step = 1usize;
        let mut i = index.len() - 1;
        loop {
            hashes.push(index[i].hash);
            if i == 0 {
                break;
            }
            i = i.saturating_sub(step);
            step *= 2;
        }
        hashes
    }

    /// The difficulty a block submitted right now, with the given major
    /// version, must satisfy.
    pub fn next_difficulty(&self, major_version: u8) -> u64 {
        let index = self.chain_index.read().unwrap_or_else(|p| p.into_inner());
        window_for(&index, self.params.difficulty_params, major_version)
    }

    pub fn already_generated_coins(&self) -> u128 {
        self.chain_index.read().unwrap_or_else(|p| p.into_inner()).last().map(|e| e.already_generated_coins).unwrap_or(0)
    }

    pub fn median_block_size(&self) -> usize {
        let index = self.chain_index.read().unwrap_or_else(|p| p.into_inner());
        let window = self.params.timestamp_check_window.max(1);
        let start = index.len().saturating_sub(window);
        let mut sizes: Vec<usize> = index[start..].iter().map(|e| e.block_size).collect();
        if sizes.is_empty() {
            return 0;
        }
        sizes.sort_unstable();
        sizes[sizes.len() / 2]
    }

    /// Submits a candidate block together with the bodies of its
    /// non-coinbase transactions (in `block.transaction_hashes` order).
    /// Extends the main chain directly when its parent is the current tip;
    /// otherwise tracks it as an alternative chain block and reorganizes
    /// onto it once its cumulative difficulty overtakes the main chain's,
    /// per spec.md §4.2.
    pub fn add_block(&self, block: Block, transactions: Vec<Transaction>) -> Result<AddBlockResult, ChainStorageError> {
        if self.get_block_by_hash(&block.hash())?.is_some() {
            return Ok(AddBlockResult::AlreadyExists);
        }

        match self.top_hash() {
            None => {
                self.validate_and_push_main(&block, &transactions, 0, 1)?;
                Ok(AddBlockResult::Added { height: 0 })
            },
            Some(tip) if block.header.previous_block_hash == tip => {
                let height = self.height();
                let difficulty = self.next_difficulty(block.header.major_version);
                self.validate_and_push_main(&block, &transactions, height, difficulty)?;
                Ok(AddBlockResult::Added { height })
            },
            Some(_) => self.add_alt_block(block, transactions),
        }
    }

    fn validate_and_push_main(
        &self,
        block: &Block,
        transactions: &[Transaction],
        height: u64,
        difficulty: u64,
    ) -> Result<(), ChainStorageError> {
        let index = self.chain_index.read().unwrap_or_else(|p| p.into_inner());
        let window = self.params.timestamp_check_window;
        let start = index.len().saturating_sub(window);
        let previous_timestamps: Vec<u64> = index[start..].iter().map(|e| e.timestamp).collect();
        let already_generated_coins = index.last().map(|e| e.already_generated_coins).unwrap_or(0);
        let median_block_size = self.median_block_size();
        drop(index);

        let ctx = ValidationContext {
            height,
            previous_timestamps: &previous_timestamps,
            block_future_time_limit: self.params.block_future_time_limit,
            difficulty: difficulty as u128,
            checkpoints: &self.params.checkpoints,
            mixin_bounds: &self.params.mixin_bounds,
            already_generated_coins,
            median_block_size,
            block_size: block.base_transaction.serialized_size(),
            minimum_fee: self.params.minimum_fee,
            is_key_image_spent: &|ki| self.is_key_image_spent(ki),
        };
        validate_block(block, &ctx, transactions)?;

        self.backend.push_block(block)?;
        let reward = block.base_transaction.prefix.total_output_amount().unwrap_or(0);
        let mut index = self.chain_index.write().unwrap_or_else(|p| p.into_inner());
        index.push(ChainEntry {
            hash: block.hash(),
            timestamp: block.header.timestamp,
            cumulative_difficulty: index.last().map(|e| e.cumulative_difficulty).unwrap_or(0) + difficulty,
            already_generated_coins: already_generated_coins + reward as u128,
            block_size: block.base_transaction.serialized_size(),
        });
        drop(index);

        self.record_spent_key_images(transactions.iter().flat_map(|tx| tx.prefix.inputs.iter().filter_map(|i| i.key_image())));
        self.committed_transactions.write().unwrap_or_else(|p| p.into_inner()).insert(block.hash(), transactions.to_vec());
        Ok(())
    }

    fn add_alt_block(&self, block: Block, transactions: Vec<Transaction>) -> Result<AddBlockResult, ChainStorageError> {
        let parent_hash = block.header.previous_block_hash;
        let (parent_height, parent_cumulative, parent_generated) = self.locate(&parent_hash)?;

        let difficulty = self.next_difficulty(block.header.major_version);
        let hash_as_int = BigUint::from_bytes_le(block.long_hash().as_bytes());
        let target = pow_target(difficulty);
        if hash_as_int > target {
            return Err(ChainStorageError::Validation(crate::error::ValidationError::ProofOfWorkTooWeak {
                hash: block.long_hash(),
                difficulty: difficulty as u128,
            }));
        }

        let height = parent_height + 1;
        let cumulative_difficulty = parent_cumulative + difficulty;
        let reward = block.base_transaction.prefix.total_output_amount().unwrap_or(0);
        let already_generated_coins = parent_generated + reward as u128;

        self.alt_blocks.write().unwrap_or_else(|p| p.into_inner()).insert(
            block.hash(),
            AltBlock { block: block.clone(), transactions, height, cumulative_difficulty, already_generated_coins },
        );

        let main_cumulative =
            self.chain_index.read().unwrap_or_else(|p| p.into_inner()).last().map(|e| e.cumulative_difficulty).unwrap_or(0);
        if cumulative_difficulty > main_cumulative {
            let (split_height, evicted_blocks, evicted_transactions) = self.reorganize(&block.hash())?;
            return Ok(AddBlockResult::ChainReorganized { split_height, new_height: height, evicted_blocks, evicted_transactions });
        }
        Ok(AddBlockResult::AddedToAltChain { height })
    }

    /// Finds `hash`'s height, cumulative difficulty and generated-coins
    /// total, whether it's on the main chain or an alt branch.
    fn locate(&self, hash: &Hash) -> Result<(u64, u64, u128), ChainStorageError> {
        let index = self.chain_index.read().unwrap_or_else(|p| p.into_inner());
        if let Some(pos) = index.iter().position(|e| e.hash == *hash) {
            let entry = &index[pos];
            return Ok((pos as u64, entry.cumulative_difficulty, entry.already_generated_coins));
        }
        drop(index);
        let alt = self.alt_blocks.read().unwrap_or_else(|p| p.into_inner());
        match alt.get(hash) {
            Some(a) => Ok((a.height, a.cumulative_difficulty, a.already_generated_coins)),
            None => Err(ChainStorageError::BlockNotFound(*hash)),
        }
    }

    /// Walks the alt chain ending at `tip` back to its split point on the
    /// main chain, pops the main chain down to that point, and replays the
    /// alt blocks in order. On any validation failure midway, the popped
    /// main-chain blocks are restored and the error is surfaced — the main
    /// chain is never left shorter than it started.
    fn reorganize(&self, tip: &Hash) -> Result<(u64, Vec<Block>, Vec<Transaction>), ChainStorageError> {
        let alt_blocks = self.alt_blocks.read().unwrap_or_else(|p| p.into_inner());
        let mut chain: Vec<(Block, Vec<Transaction>)> = Vec::new();
        let mut cursor = *tip;
        let split_height;
        loop {
            match alt_blocks.get(&cursor) {
                Some(alt) => {
                    chain.push((alt.block.clone(), alt.transactions.clone()));
                    cursor = alt.block.header.previous_block_hash;
                },
                None => {
                    let index = self.chain_index.read().unwrap_or_else(|p| p.into_inner());
                    split_height = index
                        .iter()
                        .position(|e| e.hash == cursor)
                        .map(|p| p as u64 + 1)
                        .ok_or(ChainStorageError::InvalidAlternativeChain {
                            split_height: 0,
                            reason: "alt chain does not connect to the main chain".into(),
                        })?;
                    break;
                },
            }
        }
        drop(alt_blocks);
        chain.reverse();

        let mut popped: Vec<(Block, Vec<Transaction>)> = Vec::new();
        while self.height() > split_height {
            popped.push(self.pop_top_block()?);
        }

        for (block, transactions) in &chain {
            let height = self.height();
            let difficulty = self.next_difficulty(block.header.major_version);
            if let Err(err) = self.validate_and_push_main(block, transactions, height, difficulty) {
                // Restore the original main chain before surfacing the error.
                while self.height() > split_height {
                    self.pop_top_block().ok();
                }
                for (restore_block, restore_txs) in popped.into_iter().rev() {
                    self.backend.push_block(&restore_block).ok();
                    self.committed_transactions
                        .write()
                        .unwrap_or_else(|p| p.into_inner())
                        .insert(restore_block.hash(), restore_txs.clone());
                    self.record_spent_key_images(
                        restore_txs.iter().flat_map(|tx| tx.prefix.inputs.iter().filter_map(|i| i.key_image())),
                    );
                }
                return Err(ChainStorageError::InvalidAlternativeChain {
                    split_height,
                    reason: err.to_string(),
                });
            }
        }

        let mut alt_blocks = self.alt_blocks.write().unwrap_or_else(|p| p.into_inner());
        for (block, _) in &chain {
            alt_blocks.remove(&block.hash());
        }
        drop(alt_blocks);
        popped.reverse();
        let evicted_blocks: Vec<Block> = popped.iter().map(|(b, _)| b.clone()).collect();
        let evicted_transactions: Vec<Transaction> = popped.into_iter().flat_map(|(_, txs)| txs).collect();
        Ok((split_height, evicted_blocks, evicted_transactions))
    }
}

fn window_for(index: &[ChainEntry], params: DifficultyParams, major_version: u8) -> u64 {
    let variant = DifficultyVariant::for_major_version(major_version);
    let take = (params.window as usize) + 1;
    let start = index.len().saturating_sub(take);
    let timestamps: Vec<u64> = index[start..].iter().map(|e| e.timestamp).collect();
    let cumulative: Vec<u64> = index[start..].iter().map(|e| e.cumulative_difficulty).collect();
    next_difficulty(variant, params, &timestamps, &cumulative)
}

fn pow_target(difficulty: u64) -> BigUint {
    let two_256 = BigUint::one() << 256u32;
    if difficulty == 0 {
        return two_256;
    }
    two_256 / BigUint::from(difficulty)
}

/// The unpenalized+penalized coinbase reward a block at `height` should
/// pay, before adding pool transaction fees (the engine's caller — the
/// mempool-aware block-template builder — adds those).
pub fn expected_base_reward(already_generated_coins: u128) -> u64 {
    base_reward(already_generated_coins)
}

#[cfg(test)]
mod tests {
    use ember_crypto::SecretKey;

    use super::*;
    use crate::{
        blocks::BlockHeader,
        chain_storage::MemoryBackend,
        transactions::{Transaction, TransactionInput, TransactionOutput, TransactionPrefix},
    };

    fn params() -> ChainParams {
        ChainParams {
            checkpoints: Checkpoints::new(),
            mixin_bounds: MixinBounds::new(u64::MAX),
            difficulty_params: DifficultyParams { target_seconds: 120, window: 3, future_time_limit: 7200 },
            block_future_time_limit: 7200,
            minimum_fee: 0,
            soft_shell_active_from: None,
            timestamp_check_window: 3,
        }
    }

    fn coinbase(height: u64) -> Transaction {
        let pubkey = SecretKey::from_bytes_mod_order(&[height as u8 + 1; 32]).public_key();
        let prefix = TransactionPrefix {
            version: 1,
            unlock_time: height + 60,
            inputs: vec![TransactionInput::Coinbase { block_index: height }],
            outputs: vec![TransactionOutput::key(1, pubkey)],
            extra: Vec::new(),
        };
        Transaction::new(prefix, vec![])
    }

    fn block(height: u64, previous: Hash, timestamp: u64, nonce: u32) -> Block {
        let header = BlockHeader {
            major_version: 1,
            minor_version: 0,
            timestamp,
            previous_block_hash: previous,
            nonce,
            parent_block: None,
        };
        Block::new(header, coinbase(height), vec![], height, None)
    }

    #[test]
    fn genesis_bootstraps_an_empty_chain() {
        let chain = Blockchain::new(MemoryBackend::new(), params()).unwrap();
        let genesis = block(0, Hash::ZERO, 1_700_000_000, 0);
        let result = chain.add_block(genesis.clone(), vec![]).unwrap();
        assert_eq!(result, AddBlockResult::Added { height: 0 });
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.top_hash(), Some(genesis.hash()));
    }

    #[test]
    fn linear_extension_grows_the_chain() {
        let chain = Blockchain::new(MemoryBackend::new(), params()).unwrap();
        let genesis = block(0, Hash::ZERO, 1_700_000_000, 0);
        chain.add_block(genesis.clone(), vec![]).unwrap();
        let next = block(1, genesis.hash(), 1_700_000_200, 1);
        let result = chain.add_block(next.clone(), vec![]).unwrap();
        assert_eq!(result, AddBlockResult::Added { height: 1 });
        assert_eq!(chain.height(), 2);
    }

    #[test]
    fn resubmitting_the_same_block_is_a_no_op() {
        let chain = Blockchain::new(MemoryBackend::new(), params()).unwrap();
        let genesis = block(0, Hash::ZERO, 1_700_000_000, 0);
        chain.add_block(genesis.clone(), vec![]).unwrap();
        assert_eq!(chain.add_block(genesis, vec![]).unwrap(), AddBlockResult::AlreadyExists);
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let chain = Blockchain::new(MemoryBackend::new(), params()).unwrap();
        let genesis = block(0, Hash::ZERO, 1_700_000_000, 0);
        chain.add_block(genesis, vec![]).unwrap();
        let orphan = block(5, Hash::from([9u8; 32]), 1_700_000_900, 3);
        assert!(chain.add_block(orphan, vec![]).is_err());
    }

    #[test]
    fn sparse_chain_always_includes_the_tip_and_genesis() {
        let chain = Blockchain::new(MemoryBackend::new(), params()).unwrap();
        let genesis = block(0, Hash::ZERO, 1_700_000_000, 0);
        chain.add_block(genesis.clone(), vec![]).unwrap();
        let next = block(1, genesis.hash(), 1_700_000_200, 1);
        chain.add_block(next.clone(), vec![]).unwrap();
        let sparse = chain.build_sparse_chain();
        assert_eq!(sparse.first(), Some(&next.hash()));
        assert_eq!(sparse.last(), Some(&genesis.hash()));
    }
}
