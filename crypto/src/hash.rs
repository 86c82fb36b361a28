use std::fmt;

use serde::{Deserialize, Serialize};
use tiny_keccak::{Hasher, Keccak};

pub const HASH_SIZE: usize = 32;

/// A 32-byte hash. Byte-exact equality, deterministic from its input.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Hash(pub [u8; HASH_SIZE]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; HASH_SIZE]);

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        if bytes.len() != HASH_SIZE {
            return None;
        }
        let mut out = [0u8; HASH_SIZE];
        out.copy_from_slice(&bytes);
        Some(Hash(out))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; HASH_SIZE]> for Hash {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The general-purpose fast hash used throughout the protocol for
/// transaction/block prefix hashing and Merkle tree nodes. Equivalent to
/// the reference daemon's `CnFastHash`: a single Keccak-1600 absorb/squeeze
/// with a 256-bit output.
pub fn fast_hash(data: &[u8]) -> Hash {
    let mut keccak = Keccak::v256();
    keccak.update(data);
    let mut out = [0u8; HASH_SIZE];
    keccak.finalize(&mut out);
    Hash(out)
}

/// Hashes the concatenation of two 32-byte hashes, the primitive the Merkle
/// tree is built from.
fn hash_pair(a: &Hash, b: &Hash) -> Hash {
    let mut buf = [0u8; HASH_SIZE * 2];
    buf[..HASH_SIZE].copy_from_slice(&a.0);
    buf[HASH_SIZE..].copy_from_slice(&b.0);
    fast_hash(&buf)
}

/// Returns the largest power of two less than or equal to `n` (`n` > 0).
fn largest_pow2_leq(n: usize) -> usize {
    let mut cnt = n - 1;
    let mut shift = 1;
    while shift < usize::BITS as usize {
        cnt |= cnt >> shift;
        shift <<= 1;
    }
    cnt & !(cnt >> 1)
}

/// Computes the block Merkle root over `[coinbase_hash, tx_hash...]`, using
/// the reference daemon's unbalanced binary tree construction: the leaves
/// are reduced two-at-a-time, with any leaves beyond the largest
/// power-of-two count folded in on the first pass so every later pass
/// operates on an exact power of two.
pub fn tree_hash(hashes: &[Hash]) -> Hash {
    match hashes.len() {
        0 => Hash::ZERO,
        1 => hashes[0],
        2 => hash_pair(&hashes[0], &hashes[1]),
        count => {
            let cnt = largest_pow2_leq(count - 1);
            let mut level: Vec<Hash> = Vec::with_capacity(cnt);
            let carry_over = 2 * cnt - count;
            level.extend_from_slice(&hashes[..carry_over]);
            let mut i = carry_over;
            while level.len() < cnt {
                level.push(hash_pair(&hashes[i], &hashes[i + 1]));
                i += 2;
            }
            debug_assert_eq!(i, count);

            while level.len() > 2 {
                let half = level.len() / 2;
                let mut next = Vec::with_capacity(half);
                for pair in level.chunks_exact(2) {
                    next.push(hash_pair(&pair[0], &pair[1]));
                }
                level = next;
            }
            hash_pair(&level[0], &level[1])
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_hash_is_deterministic() {
        assert_eq!(fast_hash(b"ember"), fast_hash(b"ember"));
        assert_ne!(fast_hash(b"ember"), fast_hash(b"ember2"));
    }

    #[test]
    fn tree_hash_single_leaf_is_identity() {
        let h = fast_hash(b"leaf");
        assert_eq!(tree_hash(&[h]), h);
    }

    #[test]
    fn tree_hash_two_leaves_matches_pair_hash() {
        let a = fast_hash(b"a");
        let b = fast_hash(b"b");
        assert_eq!(tree_hash(&[a, b]), hash_pair(&a, &b));
    }

    #[test]
    fn tree_hash_is_deterministic_for_odd_counts() {
        let leaves: Vec<Hash> = (0..5u8).map(|i| fast_hash(&[i])).collect();
        let root1 = tree_hash(&leaves);
        let root2 = tree_hash(&leaves);
        assert_eq!(root1, root2);
    }

    #[test]
    fn tree_hash_changes_with_leaf_order() {
        let mut leaves: Vec<Hash> = (0..4u8).map(|i| fast_hash(&[i])).collect();
        let root1 = tree_hash(&leaves);
        leaves.swap(0, 1);
        let root2 = tree_hash(&leaves);
        assert_ne!(root1, root2);
    }

    #[test]
    fn hex_roundtrip() {
        let h = fast_hash(b"roundtrip");
        assert_eq!(Hash::from_hex(&h.to_hex()).unwrap(), h);
    }
}
