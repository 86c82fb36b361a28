//! Transaction pool: holds not-yet-mined transactions, rejects
//! conflicting double-spends among them, and assembles block templates.
//! The "recently deleted" TTL map is grounded on
//! `original_source/lib/CryptoNoteCore/Transactions/TransactionPoolCleaner.h`.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use ember_crypto::Hash;

use crate::{
    consensus::{MixinBounds, POOL_TX_LIVE_TIME_SECS, POOL_TX_RECENTLY_DELETED_TTL_SECS},
    error::MempoolError,
    transactions::Transaction,
    validation::validate_transaction,
};

struct Entry {
    tx: Transaction,
    received_at: u64,
}

/// Unconfirmed transactions plus the aggregate key-image set used to
/// reject double-spends among pool entries before they ever reach a
/// block, and the recently-deleted map that defends against gossip loops
/// re-admitting a transaction immediately after legitimate eviction.
pub struct Mempool {
    entries: RwLock<HashMap<Hash, Entry>>,
    key_images: RwLock<HashSet<[u8; 32]>>,
    recently_deleted: RwLock<HashMap<Hash, u64>>,
    minimum_fee: u64,
}

impl Mempool {
    pub fn new(minimum_fee: u64) -> Self {
        Mempool {
            entries: RwLock::new(HashMap::new()),
            key_images: RwLock::new(HashSet::new()),
            recently_deleted: RwLock::new(HashMap::new()),
            minimum_fee,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).contains_key(hash)
    }

    /// Looks up a pool transaction by hash, e.g. to resolve a gossiped
    /// block's declared transaction hashes into bodies.
    pub fn get(&self, hash: &Hash) -> Option<Transaction> {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).get(hash).map(|entry| entry.tx.clone())
    }

    /// Admits `tx` iff it isn't within its recently-deleted cooldown,
    /// passes independent validation, and none of its key images are
    /// already claimed by another pool transaction.
    pub fn push(
        &self,
        tx: Transaction,
        height: u64,
        mixin_bounds: &MixinBounds,
        now: u64,
    ) -> Result<(), MempoolError> {
        let hash = tx.hash();
        if self.contains(&hash) {
            return Err(MempoolError::AlreadyInPool(hash));
        }
        {
            let deleted = self.recently_deleted.read().unwrap_or_else(|p| p.into_inner());
            if let Some(&deleted_at) = deleted.get(&hash) {
                if now.saturating_sub(deleted_at) < POOL_TX_RECENTLY_DELETED_TTL_SECS {
                    return Err(MempoolError::RecentlyDeleted(hash));
                }
            }
        }

        validate_transaction(&tx, height, mixin_bounds, &|_| false, self.minimum_fee)
            .map_err(|e| MempoolError::Invalid(hash, e))?;

        let tx_key_images: Vec<[u8; 32]> =
            tx.prefix.inputs.iter().filter_map(|i| i.key_image()).map(|k| k.to_bytes()).collect();

        let mut key_images = self.key_images.write().unwrap_or_else(|p| p.into_inner());
        if tx_key_images.iter().any(|ki| key_images.contains(ki)) {
            let conflicting = tx_key_images.iter().find(|ki| key_images.contains(*ki)).copied().unwrap_or([0u8; 32]);
            return Err(MempoolError::KeyImageConflict { tx_hash: hash, key_image: Hash::from(conflicting) });
        }
        key_images.extend(tx_key_images);
        drop(key_images);

        self.entries.write().unwrap_or_else(|p| p.into_inner()).insert(hash, Entry { tx, received_at: now });
        Ok(())
    }

    /// Evicts `hash`, freeing its key images and recording it in the
    /// recently-deleted map so it cannot be immediately re-pushed.
    pub fn remove(&self, hash: &Hash, now: u64) -> Option<Transaction> {
        let entry = self.entries.write().unwrap_or_else(|p| p.into_inner()).remove(hash)?;
        let mut key_images = self.key_images.write().unwrap_or_else(|p| p.into_inner());
        for input in &entry.tx.prefix.inputs {
            if let Some(ki) = input.key_image() {
                key_images.remove(&ki.to_bytes());
            }
        }
        drop(key_images);
        self.recently_deleted.write().unwrap_or_else(|p| p.into_inner()).insert(*hash, now);
        Some(entry.tx)
    }

    /// Called after a block is accepted onto the main chain: evicts every
    /// pool transaction the block itself committed.
    pub fn evict_committed(&self, tx_hashes: &[Hash], now: u64) {
        for hash in tx_hashes {
            self.remove(hash, now);
        }
    }

    /// Reinserts a popped block's transactions, bypassing the
    /// recently-deleted cooldown (they were never illegitimately evicted).
    pub fn restore(&self, txs: Vec<Transaction>, now: u64) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        let mut key_images = self.key_images.write().unwrap_or_else(|p| p.into_inner());
        for tx in txs {
            let tx_key_images: Vec<[u8; 32]> =
                tx.prefix.inputs.iter().filter_map(|i| i.key_image()).map(|k| k.to_bytes()).collect();
            if tx_key_images.iter().any(|ki| key_images.contains(ki)) {
                continue;
            }
            key_images.extend(tx_key_images);
            entries.insert(tx.hash(), Entry { tx, received_at: now });
        }
    }

    /// Greedily selects pool transactions by fee-per-byte, stopping once
    /// `max_bytes` (the block-size median constraint) would be exceeded.
    pub fn for_block_template(&self, max_bytes: usize) -> Vec<Transaction> {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        let mut candidates: Vec<&Entry> = entries.values().collect();
        candidates.sort_by(|a, b| fee_per_byte(&b.tx).partial_cmp(&fee_per_byte(&a.tx)).unwrap_or(std::cmp::Ordering::Equal));

        let mut selected = Vec::new();
        let mut total = 0usize;
        for entry in candidates {
            let size = entry.tx.serialized_size();
            if total + size > max_bytes {
                continue;
            }
            total += size;
            selected.push(entry.tx.clone());
        }
        selected
    }

    /// Removes transactions that have aged past the pool timeout, or that
    /// no longer pass mixin validation at `height` (a version upgrade can
    /// retroactively tighten the allowed mixin window).
    pub fn clean(&self, height: u64, mixin_bounds: &MixinBounds, now: u64) -> Vec<Hash> {
        let stale: Vec<Hash> = {
            let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
            entries
                .iter()
                .filter(|(_, entry)| {
                    now.saturating_sub(entry.received_at) > POOL_TX_LIVE_TIME_SECS
                        || !entry.tx.prefix.inputs.iter().all(|i| match i.ring_size() {
                            Some(ring_size) => mixin_bounds.is_allowed(height, ring_size.saturating_sub(1)),
                            None => true,
                        })
                })
                .map(|(hash, _)| *hash)
                .collect()
        };
        for hash in &stale {
            self.remove(hash, now);
        }

        let cutoff = now.saturating_sub(POOL_TX_RECENTLY_DELETED_TTL_SECS);
        self.recently_deleted.write().unwrap_or_else(|p| p.into_inner()).retain(|_, &mut deleted_at| deleted_at >= cutoff);

        stale
    }
}

fn fee_per_byte(tx: &Transaction) -> f64 {
    let size = tx.serialized_size().max(1) as f64;
    tx.fee().unwrap_or(0) as f64 / size
}

#[cfg(test)]
mod tests {
    use ember_crypto::SecretKey;

    use super::*;
    use crate::test_helpers::{sign_spend_prefix, spend_transaction};

    fn spend_tx(seed: u8, fee: u64) -> Transaction {
        let pubkey = SecretKey::from_bytes_mod_order(&[seed; 32]).public_key();
        spend_transaction(seed, pubkey, 100, fee)
    }

    fn bounds() -> MixinBounds {
        MixinBounds::new(u64::MAX)
    }

    #[test]
    fn push_then_contains() {
        let pool = Mempool::new(0);
        let tx = spend_tx(1, 50);
        pool.push(tx.clone(), 0, &bounds(), 1_000).unwrap();
        assert!(pool.contains(&tx.hash()));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn duplicate_key_image_is_rejected() {
        let pool = Mempool::new(0);
        let tx1 = spend_tx(1, 50);
        let mut tx2_prefix = tx1.prefix.clone();
        tx2_prefix.unlock_time = 99;
        let tx2 = sign_spend_prefix(1, tx2_prefix);
        pool.push(tx1, 0, &bounds(), 1_000).unwrap();
        assert!(matches!(pool.push(tx2, 0, &bounds(), 1_000), Err(MempoolError::KeyImageConflict { .. })));
    }

    #[test]
    fn removed_transaction_cannot_be_readmitted_within_ttl() {
        let pool = Mempool::new(0);
        let tx = spend_tx(2, 50);
        pool.push(tx.clone(), 0, &bounds(), 1_000).unwrap();
        pool.remove(&tx.hash(), 1_000);
        assert!(matches!(pool.push(tx, 0, &bounds(), 1_001), Err(MempoolError::RecentlyDeleted(_))));
    }

    #[test]
    fn for_block_template_orders_by_fee_per_byte() {
        let pool = Mempool::new(0);
        let cheap = spend_tx(3, 1);
        let rich = spend_tx(4, 1000);
        pool.push(cheap.clone(), 0, &bounds(), 1_000).unwrap();
        pool.push(rich.clone(), 0, &bounds(), 1_000).unwrap();
        let template = pool.for_block_template(usize::MAX);
        assert_eq!(template.first().map(|t| t.hash()), Some(rich.hash()));
    }

    #[test]
    fn clean_evicts_aged_out_transactions() {
        let pool = Mempool::new(0);
        let tx = spend_tx(5, 50);
        pool.push(tx.clone(), 0, &bounds(), 0).unwrap();
        let removed = pool.clean(0, &bounds(), POOL_TX_LIVE_TIME_SECS + 1);
        assert_eq!(removed, vec![tx.hash()]);
        assert!(!pool.contains(&tx.hash()));
    }
}
