//! Transaction and block codecs, chain storage, consensus rules,
//! validation and the blockchain engine.

pub mod blocks;
pub mod chain;
pub mod chain_storage;
pub mod consensus;
pub mod difficulty;
pub mod error;
pub mod events;
pub mod mempool;
pub mod transactions;
pub mod validation;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use blocks::{Block, BlockHeader, ParentBlock};
pub use chain::{AddBlockResult, Blockchain, ChainParams};
pub use chain_storage::{BlockchainBackend, LmdbBackend, MemoryBackend};
pub use error::{ChainStorageError, MempoolError, ValidationError};
pub use mempool::Mempool;
pub use transactions::{Transaction, TransactionInput, TransactionOutput, TransactionPrefix};
pub use validation::pow_meets_difficulty;
