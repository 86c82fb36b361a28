use std::sync::RwLock;

use ember_crypto::Hash;

use super::backend::BlockchainBackend;
use crate::{blocks::Block, error::ChainStorageError};

/// An in-memory main-chain store used by fast validation tests, grounded
/// on the teacher's in-memory `test_utils` backend pattern.
#[derive(Default)]
pub struct MemoryBackend {
    blocks: RwLock<Vec<Block>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlockchainBackend for MemoryBackend {
    fn push_block(&self, block: &Block) -> Result<(), ChainStorageError> {
        self.blocks.write().unwrap_or_else(|p| p.into_inner()).push(block.clone());
        Ok(())
    }

    fn pop_block(&self) -> Result<Option<Block>, ChainStorageError> {
        Ok(self.blocks.write().unwrap_or_else(|p| p.into_inner()).pop())
    }

    fn get_block_by_index(&self, height: u64) -> Result<Option<Block>, ChainStorageError> {
        let blocks = self.blocks.read().unwrap_or_else(|p| p.into_inner());
        Ok(usize::try_from(height).ok().and_then(|h| blocks.get(h).cloned()))
    }

    fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, ChainStorageError> {
        let blocks = self.blocks.read().unwrap_or_else(|p| p.into_inner());
        Ok(blocks.iter().find(|b| b.hash() == *hash).cloned())
    }

    fn get_block_count(&self) -> Result<u64, ChainStorageError> {
        Ok(self.blocks.read().unwrap_or_else(|p| p.into_inner()).len() as u64)
    }

    fn clear(&self) -> Result<(), ChainStorageError> {
        self.blocks.write().unwrap_or_else(|p| p.into_inner()).clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ember_crypto::SecretKey;

    use super::*;
    use crate::{
        blocks::BlockHeader,
        transactions::{Transaction, TransactionInput, TransactionOutput, TransactionPrefix},
    };

    fn test_block(height: u64, previous_block_hash: Hash) -> Block {
        let pubkey = SecretKey::from_bytes_mod_order(&[height as u8; 32]).public_key();
        let prefix = TransactionPrefix {
            version: 1,
            unlock_time: height + 60,
            inputs: vec![TransactionInput::Coinbase { block_index: height }],
            outputs: vec![TransactionOutput::key(1000, pubkey)],
            extra: Vec::new(),
        };
        let header = BlockHeader {
            major_version: 1,
            minor_version: 0,
            timestamp: 1_700_000_000 + height,
            previous_block_hash,
            nonce: height as u32,
            parent_block: None,
        };
        Block::new(header, Transaction::new(prefix, vec![]), vec![], height, None)
    }

    #[test]
    fn push_then_get_by_index_and_hash() {
        let backend = MemoryBackend::new();
        let genesis = test_block(0, Hash::ZERO);
        backend.push_block(&genesis).unwrap();
        assert_eq!(backend.get_block_count().unwrap(), 1);
        assert_eq!(backend.get_block_by_index(0).unwrap().unwrap().hash(), genesis.hash());
        assert_eq!(backend.get_block_by_hash(&genesis.hash()).unwrap().unwrap().hash(), genesis.hash());
    }

    #[test]
    fn pop_removes_the_tip() {
        let backend = MemoryBackend::new();
        let genesis = test_block(0, Hash::ZERO);
        let next = test_block(1, genesis.hash());
        backend.push_block(&genesis).unwrap();
        backend.push_block(&next).unwrap();
        let popped = backend.pop_block().unwrap().unwrap();
        assert_eq!(popped.hash(), next.hash());
        assert_eq!(backend.get_block_count().unwrap(), 1);
    }

    #[test]
    fn clear_empties_the_store() {
        let backend = MemoryBackend::new();
        backend.push_block(&test_block(0, Hash::ZERO)).unwrap();
        backend.clear().unwrap();
        assert_eq!(backend.get_block_count().unwrap(), 0);
    }
}
