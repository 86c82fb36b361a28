use ember_crypto::Hash;
use ember_storage::StoreError;
use thiserror::Error;

/// Errors surfaced while decoding or validating a single transaction or
/// block. Carried as structured context (heights, hex hashes) rather than
/// opaque strings, mirroring the teacher's `ValidationError`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("block {height} has malformed header: {reason}")]
    MalformedHeader { height: u64, reason: String },
    #[error("merkle root mismatch at height {height}: header says {expected}, computed {actual}")]
    MerkleRootMismatch { height: u64, expected: Hash, actual: Hash },
    #[error("base transaction at height {height} must have exactly one Coinbase input at index 0")]
    InvalidCoinbaseInput { height: u64 },
    #[error("coinbase block index {found} does not match chain height {expected}")]
    CoinbaseHeightMismatch { expected: u64, found: u64 },
    #[error("duplicate transaction hash {hash} in block")]
    DuplicateTransactionHash { hash: Hash },
    #[error("previous block hash {expected} is unknown")]
    UnknownParent { expected: Hash },
    #[error("timestamp {timestamp} exceeds allowed future drift")]
    TimestampTooFarInFuture { timestamp: u64 },
    #[error("timestamp {timestamp} is not greater than the median of the last {window} timestamps")]
    TimestampNotIncreasing { timestamp: u64, window: usize },
    #[error("proof of work too weak: hash {hash} against difficulty {difficulty}")]
    ProofOfWorkTooWeak { hash: Hash, difficulty: u128 },
    #[error("block at checkpointed height {height} has hash {found}, expected {expected}")]
    CheckpointMismatch { height: u64, expected: Hash, found: Hash },
    #[error("transaction {tx_hash} has unsupported input type at index {index}")]
    UnsupportedInputType { tx_hash: Hash, index: usize },
    #[error("transaction {tx_hash} failed ring signature verification at input {index}")]
    InvalidRingSignature { tx_hash: Hash, index: usize },
    #[error("block at height {height} declares {expected} transactions but {found} bodies were supplied")]
    MissingTransactionBody { height: u64, expected: usize, found: usize },
    #[error("transaction body at index {index} hashes to {found}, but the block declares {expected}")]
    TransactionHashMismatch { index: usize, expected: Hash, found: Hash },
    #[error("key image {key_image} already spent on-chain")]
    KeyImageAlreadySpent { key_image: Hash },
    #[error("duplicate key image {key_image} within a single transaction")]
    DuplicateKeyImageInTransaction { key_image: Hash },
    #[error("transaction {tx_hash} mixin count {mixin} outside allowed window {min}..={max}")]
    MixinOutOfRange { tx_hash: Hash, mixin: usize, min: usize, max: usize },
    #[error("transaction {tx_hash} output {index} has non-positive or overflowing amount")]
    InvalidOutputAmount { tx_hash: Hash, index: usize },
    #[error("transaction {tx_hash} inputs do not cover outputs plus minimum fee")]
    InsufficientFee { tx_hash: Hash },
    #[error("transaction {tx_hash} extra field failed to parse: {reason}")]
    MalformedExtra { tx_hash: Hash, reason: String },
    #[error("coinbase reward {found} does not match expected {expected} at height {height}")]
    CoinbaseRewardMismatch { height: u64, expected: u64, found: u64 },
}

/// Errors from the blockchain engine's higher-level operations (storage
/// failures, reorg bookkeeping), composing `ValidationError` and
/// `StoreError` the way the teacher's `ChainStorageError` composes its
/// own validation and storage error types.
#[derive(Debug, Error)]
pub enum ChainStorageError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("storage backend error: {0}")]
    Storage(#[from] StoreError),
    #[error("block {0} not found")]
    BlockNotFound(Hash),
    #[error("height {0} not found")]
    HeightNotFound(u64),
    #[error("attempted to pop the genesis block")]
    CannotPopGenesis,
    #[error("alternative chain at split height {split_height} could not be validated: {reason}")]
    InvalidAlternativeChain { split_height: u64, reason: String },
}

/// Errors from transaction pool operations.
#[derive(Debug, Error)]
pub enum MempoolError {
    #[error("transaction {0} already in the pool")]
    AlreadyInPool(Hash),
    #[error("transaction {0} was recently deleted and cannot be re-admitted yet")]
    RecentlyDeleted(Hash),
    #[error("transaction {tx_hash} key image {key_image} conflicts with a pool transaction")]
    KeyImageConflict { tx_hash: Hash, key_image: Hash },
    #[error("transaction {0} failed validation: {1}")]
    Invalid(Hash, #[source] ValidationError),
    #[error("transaction {0} not found in the pool")]
    NotFound(Hash),
}
