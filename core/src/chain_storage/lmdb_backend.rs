use ember_crypto::Hash;
use ember_storage::{LMDBBuilder, LMDBDatabase, LMDBStore};

use super::backend::BlockchainBackend;
use crate::{blocks::Block, error::ChainStorageError};

const BLOCKS_DB: &str = "blocks";
const HASH_INDEX_DB: &str = "block_hashes";
const METADATA_DB: &str = "chain_metadata";
const HEIGHT_KEY: &str = "height";

/// The durable main-chain store: blocks indexed by height, a secondary
/// hash→height index, and a metadata entry tracking the committed block
/// count, so a crash never leaves the reported count ahead of what was
/// actually synced to disk.
pub struct LmdbBackend {
    _store: LMDBStore,
    blocks: LMDBDatabase,
    hash_index: LMDBDatabase,
    metadata: LMDBDatabase,
}

impl LmdbBackend {
    pub fn open(path: &std::path::Path, map_size_mb: u64) -> Result<Self, ChainStorageError> {
        let store = LMDBBuilder::new()
            .set_path(path)
            .set_mapsize_mb(map_size_mb)
            .add_database(BLOCKS_DB)
            .add_database(HASH_INDEX_DB)
            .add_database(METADATA_DB)
            .build()?;
        let blocks = store.get_handle(BLOCKS_DB)?;
        let hash_index = store.get_handle(HASH_INDEX_DB)?;
        let metadata = store.get_handle(METADATA_DB)?;
        Ok(LmdbBackend { _store: store, blocks, hash_index, metadata })
    }

    fn height(&self) -> Result<u64, ChainStorageError> {
        Ok(self.metadata.get::<&str, u64>(&HEIGHT_KEY)?.unwrap_or(0))
    }
}

impl BlockchainBackend for LmdbBackend {
    fn push_block(&self, block: &Block) -> Result<(), ChainStorageError> {
        let height = self.height()?;
        self.blocks.insert(&height, block)?;
        self.hash_index.insert(&block.hash(), &height)?;
        self.metadata.insert(&HEIGHT_KEY, &(height + 1))?;
        Ok(())
    }

    fn pop_block(&self) -> Result<Option<Block>, ChainStorageError> {
        let height = self.height()?;
        if height == 0 {
            return Ok(None);
        }
        let last_height = height - 1;
        let block: Option<Block> = self.blocks.get(&last_height)?;
        if let Some(block) = &block {
            self.blocks.remove(&last_height)?;
            self.hash_index.remove(&block.hash())?;
            self.metadata.insert(&HEIGHT_KEY, &last_height)?;
        }
        Ok(block)
    }

    fn get_block_by_index(&self, height: u64) -> Result<Option<Block>, ChainStorageError> {
        Ok(self.blocks.get(&height)?)
    }

    fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, ChainStorageError> {
        let height: Option<u64> = self.hash_index.get(hash)?;
        match height {
            Some(h) => self.get_block_by_index(h),
            None => Ok(None),
        }
    }

    fn get_block_count(&self) -> Result<u64, ChainStorageError> {
        self.height()
    }

    fn clear(&self) -> Result<(), ChainStorageError> {
        self.blocks.clear()?;
        self.hash_index.clear()?;
        self.metadata.clear()?;
        Ok(())
    }
}
