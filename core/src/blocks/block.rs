use ember_crypto::{tree_hash, CryptoNightVariant, Hash};
use serde::{Deserialize, Serialize};

use super::header::BlockHeader;
use crate::transactions::Transaction;

/// A full block: header, coinbase ("base") transaction, and the hashes of
/// the transactions it includes (transaction bodies travel separately,
/// fetched from the pool or peers by hash). `hash`, `merkle_root` and
/// `long_hash` are computed once at construction and stored alongside —
/// each is a pure function of the other fields, so caching is purely a
/// performance concern, matching `CachedBlock` in the original.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub base_transaction: Transaction,
    pub transaction_hashes: Vec<Hash>,
    hash: Hash,
    merkle_root: Hash,
    long_hash: Hash,
}

impl Block {
    /// Builds a block and eagerly computes its cached fields. `height` and
    /// `soft_shell_active_from` select the proof-of-work variant the way
    /// [`ember_crypto::CryptoNightVariant::for_block`] does.
    pub fn new(
        header: BlockHeader,
        base_transaction: Transaction,
        transaction_hashes: Vec<Hash>,
        height: u64,
        soft_shell_active_from: Option<u64>,
    ) -> Self {
        let mut leaves = Vec::with_capacity(transaction_hashes.len() + 1);
        leaves.push(base_transaction.hash());
        leaves.extend_from_slice(&transaction_hashes);
        let merkle_root = tree_hash(&leaves);

        let hash = header.id_hash();
        let variant = CryptoNightVariant::for_block(header.major_version, height, soft_shell_active_from);
        let long_hash = ember_crypto::long_hash(variant, height, &header.long_hash_input());

        Block { header, base_transaction, transaction_hashes, hash, merkle_root, long_hash }
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn merkle_root(&self) -> Hash {
        self.merkle_root
    }

    pub fn long_hash(&self) -> Hash {
        self.long_hash
    }

    /// `true` if the header's declared merkle root matches the computed
    /// one; validation step 1 of spec.md §4.2.
    pub fn merkle_root_is_consistent(&self, header_merkle_root: Hash) -> bool {
        self.merkle_root == header_merkle_root
    }
}

#[derive(Serialize, Deserialize)]
struct BlockWire {
    header: BlockHeaderWithMerkleRoot,
    base_transaction: Transaction,
    transaction_hashes: Vec<Hash>,
}

#[derive(Serialize, Deserialize)]
struct BlockHeaderWithMerkleRoot {
    header: BlockHeader,
    merkle_root: Hash,
    height: u64,
    soft_shell_active_from: Option<u64>,
}

impl Serialize for Block {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // The wire form carries the height/activation context the
        // constructor needs to recompute `long_hash` on the receiving
        // side, rather than trusting a transmitted PoW hash blindly.
        BlockWire {
            header: BlockHeaderWithMerkleRoot {
                header: self.header.clone(),
                merkle_root: self.merkle_root,
                height: height_hint_from_coinbase(&self.base_transaction),
                soft_shell_active_from: None,
            },
            base_transaction: self.base_transaction.clone(),
            transaction_hashes: self.transaction_hashes.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Block {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = BlockWire::deserialize(deserializer)?;
        Ok(Block::new(
            wire.header.header,
            wire.base_transaction,
            wire.transaction_hashes,
            wire.header.height,
            wire.header.soft_shell_active_from,
        ))
    }
}

fn height_hint_from_coinbase(base_transaction: &Transaction) -> u64 {
    base_transaction
        .prefix
        .inputs
        .first()
        .and_then(|input| match input {
            crate::transactions::TransactionInput::Coinbase { block_index } => Some(*block_index),
            _ => None,
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use ember_crypto::SecretKey;

    use super::*;
    use crate::transactions::{TransactionInput, TransactionOutput, TransactionPrefix};

    fn coinbase_tx(height: u64) -> Transaction {
        let pubkey = SecretKey::from_bytes_mod_order(&[9u8; 32]).public_key();
        let prefix = TransactionPrefix {
            version: 1,
            unlock_time: height + 60,
            inputs: vec![TransactionInput::Coinbase { block_index: height }],
            outputs: vec![TransactionOutput::key(1000, pubkey)],
            extra: Vec::new(),
        };
        Transaction::new(prefix, vec![])
    }

    fn genesis_header() -> BlockHeader {
        BlockHeader { major_version: 1, minor_version: 0, timestamp: 0, previous_block_hash: Hash::ZERO, nonce: 0, parent_block: None }
    }

    #[test]
    fn merkle_root_with_no_transactions_equals_coinbase_hash() {
        let tx = coinbase_tx(0);
        let expected = tx.hash();
        let block = Block::new(genesis_header(), tx, vec![], 0, None);
        assert_eq!(block.merkle_root(), expected);
    }

    #[test]
    fn hash_and_long_hash_are_deterministic() {
        let tx = coinbase_tx(1);
        let block_a = Block::new(genesis_header(), tx.clone(), vec![], 1, None);
        let block_b = Block::new(genesis_header(), tx, vec![], 1, None);
        assert_eq!(block_a.hash(), block_b.hash());
        assert_eq!(block_a.long_hash(), block_b.long_hash());
    }

    #[test]
    fn serialization_round_trips_cached_fields() {
        let tx = coinbase_tx(7);
        let block = Block::new(genesis_header(), tx, vec![], 7, None);
        let bytes = bincode::serialize(&block).unwrap();
        let decoded: Block = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.long_hash(), block.long_hash());
    }
}
