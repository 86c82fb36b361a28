use ember_crypto::Hash;

use crate::{blocks::Block, error::ChainStorageError};

/// The abstract main-chain store: append/pop/get-by-index/count, per
/// spec.md §4.2's "Storage" paragraph. Implementations must guarantee
/// that on crash the stored block count reflects only committed blocks.
pub trait BlockchainBackend: Send + Sync {
    fn push_block(&self, block: &Block) -> Result<(), ChainStorageError>;
    fn pop_block(&self) -> Result<Option<Block>, ChainStorageError>;
    fn get_block_by_index(&self, height: u64) -> Result<Option<Block>, ChainStorageError>;
    fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, ChainStorageError>;
    fn get_block_count(&self) -> Result<u64, ChainStorageError>;
    fn clear(&self) -> Result<(), ChainStorageError>;
}
