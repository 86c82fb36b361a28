//! A single-threaded CPU miner task, started and stopped by the console's
//! `start_mining`/`stop_mining` commands. Grounded on the teacher's
//! `MiningStateController`/`CpuMiner` pattern of a poll-the-flag worker
//! loop driven by a shared `Arc<AtomicBool>`-style handle, generalized
//! here to a small dedicated struct with `start`/`stop`/`is_running`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ember_core::chain_storage::LmdbBackend;
use ember_core::{
    pow_meets_difficulty, AddBlockResult, Block, BlockHeader, Blockchain, Mempool, Transaction, TransactionInput, TransactionOutput,
    TransactionPrefix,
};
use ember_crypto::{PublicKey, SecretKey};
use log::info;

const LOG_TARGET: &str = "ember::node::miner";

pub struct MiningHandle {
    running: AtomicBool,
}

impl MiningHandle {
    pub fn new() -> Self {
        MiningHandle { running: AtomicBool::new(false) }
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        println!("mining started");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        println!("mining stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for MiningHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs until `shutdown` fires, mining one block at a time whenever
/// `handle.is_running()`. Between blocks it yields to the scheduler
/// rather than busy-spinning across the whole nonce space in one poll.
pub async fn run(
    chain: Arc<Blockchain<LmdbBackend>>,
    pool: Arc<Mempool>,
    handle: Arc<MiningHandle>,
    miner_key: PublicKey,
    mut shutdown: ember_common::ShutdownSignal,
) {
    loop {
        if shutdown.is_triggered() {
            return;
        }
        if !handle.is_running() {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            continue;
        }
        match mine_one_block(&chain, &pool, miner_key) {
            Some((block, transactions)) => {
                let height = block.header.timestamp;
                info!(target: LOG_TARGET, "mined candidate block at timestamp {height}");
                match chain.add_block(block.clone(), transactions) {
                    Ok(result) => {
                        info!(target: LOG_TARGET, "block accepted: {result:?}");
                        pool.evict_committed(&block.transaction_hashes, now());
                        if let AddBlockResult::ChainReorganized { evicted_transactions, .. } = result {
                            pool.restore(evicted_transactions, now());
                        }
                    }
                    Err(err) => info!(target: LOG_TARGET, "mined block rejected: {err}"),
                }
            }
            None => tokio::time::sleep(std::time::Duration::from_millis(50)).await,
        }
    }
}

/// Builds a block template from the pool's highest fee-per-byte
/// transactions and searches a bounded span of nonces for one that meets
/// the current difficulty. Returns `None` (rather than looping forever)
/// so the caller can re-poll the mining flag and pick up new transactions.
fn mine_one_block(chain: &Blockchain<LmdbBackend>, pool: &Mempool, miner_key: PublicKey) -> Option<(Block, Vec<Transaction>)> {
    const NONCE_SPAN: u32 = 50_000;

    let height = chain.height();
    let previous_block_hash = chain.top_hash().unwrap_or(ember_crypto::Hash::ZERO);
    let difficulty = chain.next_difficulty(1);
    let already_generated_coins = chain.already_generated_coins();
    let median_block_size = chain.median_block_size();

    let template = pool.for_block_template(median_block_size.max(1) * 2);
    let fees: u64 = template.iter().filter_map(|tx| tx.fee()).sum();
    let base = ember_core::consensus::base_reward(already_generated_coins);
    let reward = base.saturating_add(fees);

    let coinbase_prefix = TransactionPrefix {
        version: 1,
        unlock_time: height + 60,
        inputs: vec![TransactionInput::Coinbase { block_index: height }],
        outputs: vec![TransactionOutput::key(reward, miner_key)],
        extra: Vec::new(),
    };
    let coinbase = Transaction::new(coinbase_prefix, vec![]);
    let transaction_hashes: Vec<_> = template.iter().map(|tx| tx.hash()).collect();

    for nonce in 0..NONCE_SPAN {
        let header = BlockHeader {
            major_version: 1,
            minor_version: 0,
            timestamp: now(),
            previous_block_hash,
            nonce,
            parent_block: None,
        };
        let block = Block::new(header, coinbase.clone(), transaction_hashes.clone(), height, None);
        if pow_meets_difficulty(block.long_hash(), difficulty as u128) {
            return Some((block, template));
        }
    }
    None
}

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Deterministically derives a miner keypair from a seed so a node
/// restarted with the same config always mines to the same address.
pub fn miner_keypair(seed: &[u8]) -> (SecretKey, PublicKey) {
    let hash = ember_crypto::fast_hash(seed);
    let secret = SecretKey::from_bytes_mod_order(hash.as_bytes());
    let public = secret.public_key();
    (secret, public)
}
