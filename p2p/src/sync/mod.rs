//! Chain synchronization: locating the fork point against a peer's sparse
//! chain and turning the gap into a plan of objects to request. Grounded on
//! `original_source/lib/CryptoNoteProtocol`'s `findSupplement` walk, which
//! takes a peer's exponentially-spaced block id list and finds the
//! highest one already present locally.

use ember_core::{Blockchain, BlockchainBackend};
use ember_crypto::Hash;

/// What a node needs to do next to catch up with a peer, derived from
/// comparing a peer's sparse chain against the local one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Already caught up: the peer's tip is known locally.
    UpToDate,
    /// The peer is ahead; request objects for these block ids, all of
    /// which are known to connect to a common ancestor.
    RequestObjects(Vec<Hash>),
    /// None of the peer's sparse chain ids are known locally; ask for a
    /// deeper (or a full) chain entry before requesting objects.
    NeedDeeperChain,
}

/// Finds the highest block id in `their_chain` (ordered tip-first, as
/// produced by [`Blockchain::build_sparse_chain`]) that is already present
/// on `chain`'s main chain. Mirrors the original's `findSupplement`: walk
/// the peer's sparse list until a known id is hit.
pub fn find_split_height<B: BlockchainBackend>(chain: &Blockchain<B>, their_chain: &[Hash]) -> Option<u64> {
    their_chain.iter().find_map(|id| chain.height_of(id))
}

/// Given a peer's `CMD_RESPONSE_CHAIN_ENTRY` sparse id list and the local
/// chain, decides what to do next.
pub fn plan_sync<B: BlockchainBackend>(chain: &Blockchain<B>, their_block_ids: &[Hash], their_total_height: u64) -> SyncAction {
    if their_total_height <= chain.height() {
        return SyncAction::UpToDate;
    }
    let split_pos = their_block_ids.iter().position(|id| chain.height_of(id).is_some());
    match split_pos {
        Some(pos) => {
            // `their_block_ids` is tip-first; everything before the
            // matched position is unknown to us and must be fetched by
            // object id in a follow-up `REQUEST_GET_OBJECTS` round trip.
            if pos == 0 {
                SyncAction::UpToDate
            } else {
                SyncAction::RequestObjects(their_block_ids[..pos].to_vec())
            }
        }
        None => SyncAction::NeedDeeperChain,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::test_helpers::genesis_block;
    use ember_core::chain_storage::MemoryBackend;
    use ember_core::ChainParams;
    use ember_core::consensus::{Checkpoints, MixinBounds};
    use ember_core::difficulty::DifficultyParams;

    fn test_chain() -> Blockchain<MemoryBackend> {
        let backend = MemoryBackend::new();
        let params = ChainParams {
            checkpoints: Checkpoints::new(),
            mixin_bounds: MixinBounds::new(0),
            difficulty_params: DifficultyParams { target_seconds: 120, window: 60, future_time_limit: 7200 },
            block_future_time_limit: 7200,
            minimum_fee: 0,
            soft_shell_active_from: None,
            timestamp_check_window: 60,
        };
        let chain = Blockchain::new(backend, params).unwrap();
        let genesis = genesis_block(1000);
        chain.add_block(genesis, vec![]).unwrap();
        chain
    }

    #[test]
    fn up_to_date_peer_needs_nothing() {
        let chain = test_chain();
        let ours = chain.build_sparse_chain();
        assert_eq!(plan_sync(&chain, &ours, chain.height()), SyncAction::UpToDate);
    }

    #[test]
    fn unknown_peer_chain_requests_a_deeper_entry() {
        let chain = test_chain();
        assert_eq!(plan_sync(&chain, &[Hash::ZERO], chain.height() + 5), SyncAction::NeedDeeperChain);
    }

    #[test]
    fn split_height_locates_the_common_ancestor() {
        let chain = test_chain();
        let genesis_hash = chain.get_block_by_height(0).unwrap().unwrap().hash();
        assert_eq!(find_split_height(&chain, &[genesis_hash]), Some(0));
    }
}
