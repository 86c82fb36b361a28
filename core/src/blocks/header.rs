use ember_crypto::{fast_hash, Hash};
use serde::{Deserialize, Serialize};

/// The merge-mining auxiliary header carried inside block major versions
/// 2 and 3. Its "for hashing" and "for storage" encodings differ: the
/// hashing form omits the fields that would make the long-hash input
/// depend on data only known after mining completes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentBlock {
    pub minor_version: u8,
    pub previous_block_hash: Hash,
    pub transaction_count: u16,
    pub merkle_root: Hash,
    pub base_transaction_branch: Vec<Hash>,
    pub nonce: u32,
}

impl ParentBlock {
    /// The bytes a miner hashes against: everything except the
    /// `base_transaction_branch`, which exists only to let a storage
    /// reader reconstruct the parent's full Merkle tree after the fact.
    fn hashing_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.push(self.minor_version);
        bytes.extend_from_slice(self.previous_block_hash.as_bytes());
        bytes.extend_from_slice(&self.transaction_count.to_le_bytes());
        bytes.extend_from_slice(self.merkle_root.as_bytes());
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        bytes
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub major_version: u8,
    pub minor_version: u8,
    pub timestamp: u64,
    pub previous_block_hash: Hash,
    pub nonce: u32,
    /// Present only for `major_version` 2 or 3 (merge mining).
    pub parent_block: Option<ParentBlock>,
}

impl BlockHeader {
    /// The bytes [`ember_crypto::long_hash`] is computed over: the plain
    /// header for versions 1 and >=4, or the parent block's hashing form
    /// for versions 2/3, per spec.md §6.
    pub fn long_hash_input(&self) -> Vec<u8> {
        match (self.major_version, &self.parent_block) {
            (2 | 3, Some(parent)) => parent.hashing_bytes(),
            _ => self.canonical_bytes(),
        }
    }

    /// The plain encoding used for block hashing/storage outside the
    /// merge-mining path.
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.push(self.major_version);
        bytes.push(self.minor_version);
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(self.previous_block_hash.as_bytes());
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        bytes
    }

    /// The block-identity hash (distinct from the long hash used for
    /// PoW): always the plain header form plus the previous hash, never
    /// the merge-mining parent form.
    pub fn id_hash(&self) -> Hash {
        fast_hash(&self.canonical_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(major_version: u8) -> BlockHeader {
        BlockHeader {
            major_version,
            minor_version: 0,
            timestamp: 1_700_000_000,
            previous_block_hash: Hash::ZERO,
            nonce: 7,
            parent_block: None,
        }
    }

    #[test]
    fn v1_and_v4_use_canonical_bytes_for_long_hash() {
        let h1 = header(1);
        let h4 = header(4);
        assert_eq!(h1.long_hash_input(), h1.canonical_bytes());
        assert_eq!(h4.long_hash_input(), h4.canonical_bytes());
    }

    #[test]
    fn v2_without_parent_block_falls_back_to_canonical() {
        let h2 = header(2);
        assert_eq!(h2.long_hash_input(), h2.canonical_bytes());
    }

    #[test]
    fn v2_with_parent_block_hashes_the_parent_form() {
        let mut h2 = header(2);
        h2.parent_block = Some(ParentBlock {
            minor_version: 0,
            previous_block_hash: Hash::ZERO,
            transaction_count: 1,
            merkle_root: fast_hash(b"root"),
            base_transaction_branch: vec![fast_hash(b"leaf")],
            nonce: 99,
        });
        assert_ne!(h2.long_hash_input(), h2.canonical_bytes());
    }

    #[test]
    fn id_hash_is_deterministic_and_ignores_parent_block() {
        let h2a = header(2);
        let mut h2b = header(2);
        h2b.parent_block = Some(ParentBlock {
            minor_version: 0,
            previous_block_hash: Hash::ZERO,
            transaction_count: 1,
            merkle_root: fast_hash(b"root"),
            base_transaction_branch: vec![],
            nonce: 5,
        });
        assert_eq!(h2a.id_hash(), h2b.id_hash());
    }
}
