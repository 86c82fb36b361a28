//! Wire command IDs and handshake/sync payload shapes, grounded on
//! `original_source/lib/P2p/P2pProtocolDefinitions.h`. P2P-level commands
//! (handshake, timed sync, ping) are namespaced from their own base,
//! distinct from the block/tx/sync command base, exactly as the original
//! keeps `P2pProtocolDefinitions.h` separate from the block protocol's
//! command table.

use bitflags::bitflags;
use ember_crypto::Hash;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Optional protocol extensions a peer supports, negotiated during the
    /// handshake. `FLUFFY_BLOCKS` lets `NotifyNewLiteBlock` stand in for a
    /// full `NotifyNewBlock` when both ends have the transactions already.
    #[derive(Default, Serialize, Deserialize)]
    pub struct PeerSupportFlags: u32 {
        const FLUFFY_BLOCKS = 0b0000_0001;
    }
}

pub const P2P_COMMANDS_POOL_BASE: u32 = 1000;
pub const CMD_HANDSHAKE: u32 = P2P_COMMANDS_POOL_BASE + 1;
pub const CMD_TIMED_SYNC: u32 = P2P_COMMANDS_POOL_BASE + 2;
pub const CMD_PING: u32 = P2P_COMMANDS_POOL_BASE + 3;

/// Block/transaction protocol commands use a separate namespace so a
/// malformed ID can never be mistaken for a P2P-level one.
pub const BLOCK_COMMANDS_POOL_BASE: u32 = 2000;
pub const CMD_NOTIFY_NEW_BLOCK: u32 = BLOCK_COMMANDS_POOL_BASE + 1;
pub const CMD_NOTIFY_NEW_LITE_BLOCK: u32 = BLOCK_COMMANDS_POOL_BASE + 2;
pub const CMD_NOTIFY_MISSING_TXS: u32 = BLOCK_COMMANDS_POOL_BASE + 3;
pub const CMD_NOTIFY_NEW_TRANSACTIONS: u32 = BLOCK_COMMANDS_POOL_BASE + 4;
pub const CMD_REQUEST_CHAIN: u32 = BLOCK_COMMANDS_POOL_BASE + 5;
pub const CMD_RESPONSE_CHAIN_ENTRY: u32 = BLOCK_COMMANDS_POOL_BASE + 6;
pub const CMD_REQUEST_GET_OBJECTS: u32 = BLOCK_COMMANDS_POOL_BASE + 7;
pub const CMD_RESPONSE_GET_OBJECTS: u32 = BLOCK_COMMANDS_POOL_BASE + 8;
pub const CMD_REQUEST_TX_POOL: u32 = BLOCK_COMMANDS_POOL_BASE + 9;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicNodeData {
    pub network_id: [u8; 16],
    pub version: u8,
    pub local_time: u64,
    pub my_port: u32,
    pub peer_id: u64,
    pub node_version: String,
    pub support_flags: PeerSupportFlags,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreSyncData {
    pub current_height: u64,
    pub top_id: Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerlistEntry {
    pub ip: u32,
    pub port: u32,
    pub peer_id: u64,
    pub last_seen: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeRequest {
    pub node_data: BasicNodeData,
    pub payload_data: CoreSyncData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub node_data: BasicNodeData,
    pub payload_data: CoreSyncData,
    pub local_peerlist: Vec<PeerlistEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedSyncRequest {
    pub payload_data: CoreSyncData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedSyncResponse {
    pub local_time: u64,
    pub payload_data: CoreSyncData,
    pub local_peerlist: Vec<PeerlistEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    pub peer_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyNewBlock {
    pub block_bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyNewLiteBlock {
    pub header_bytes: Vec<u8>,
    pub transaction_hashes: Vec<Hash>,
    pub current_blockchain_height: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyMissingTxs {
    pub block_hash: Hash,
    pub missing: Vec<Hash>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyNewTransactions {
    pub transaction_bytes: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestChain {
    /// Sparse chain, exponentially spaced backwards from the sender's tip.
    pub block_ids: Vec<Hash>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseChainEntry {
    pub start_height: u64,
    pub total_height: u64,
    pub block_ids: Vec<Hash>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestGetObjects {
    pub block_ids: Vec<Hash>,
    pub transaction_ids: Vec<Hash>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseGetObjects {
    pub blocks: Vec<Vec<u8>>,
    pub transactions: Vec<Vec<u8>>,
    pub missed_ids: Vec<Hash>,
    pub current_blockchain_height: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTxPool {
    pub transaction_ids: Vec<Hash>,
}
