use ember_crypto::Hash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum P2pError {
    #[error("peer {0} is banned")]
    PeerBanned(u32),
    #[error("peer {0} exceeded the transaction push rate limit")]
    RateLimited(u64),
    #[error("received command id {0} in state {1:?}, which does not permit it")]
    UnexpectedCommand(u32, crate::connection::ConnectionState),
    #[error("malformed wire message: {0}")]
    Codec(String),
    #[error("block {0} could not be applied: {1}")]
    ChainRejected(Hash, String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
