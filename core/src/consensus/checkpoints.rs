use std::collections::BTreeMap;

use ember_crypto::Hash;
use serde::{Deserialize, Serialize};

/// A height→hash map of hard-coded consensus checkpoints, mirroring
/// `original_source/lib/CryptoNoteCore/Checkpoints.h`'s `Checkpoints`
/// class. Blocks at a checkpointed height must match exactly; blocks
/// below the highest checkpoint skip proof-of-work re-verification.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Checkpoints {
    points: BTreeMap<u64, Hash>,
}

impl Checkpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// The checkpoint table embedded in this binary. Empty until the
    /// network has run long enough to accumulate checkpoints worth
    /// hard-coding; operators may extend it via `add`.
    pub fn embedded() -> Self {
        Checkpoints::new()
    }

    pub fn add(&mut self, height: u64, hash: Hash) -> bool {
        match self.points.get(&height) {
            Some(existing) if *existing != hash => false,
            _ => {
                self.points.insert(height, hash);
                true
            },
        }
    }

    pub fn is_in_checkpoint_zone(&self, height: u64) -> bool {
        self.points.keys().next_back().is_some_and(|&highest| height <= highest)
    }

    /// Checks `hash` against a checkpoint at `height`, if one is
    /// registered. `None` means no opinion (height isn't checkpointed).
    pub fn check_block(&self, height: u64, hash: Hash) -> Option<bool> {
        self.points.get(&height).map(|expected| *expected == hash)
    }

    pub fn highest(&self) -> Option<u64> {
        self.points.keys().next_back().copied()
    }
}

#[cfg(test)]
mod tests {
    use ember_crypto::fast_hash;

    use super::*;

    #[test]
    fn empty_table_has_no_opinion() {
        let checkpoints = Checkpoints::new();
        assert_eq!(checkpoints.check_block(100, fast_hash(b"x")), None);
        assert!(!checkpoints.is_in_checkpoint_zone(100));
    }

    #[test]
    fn matching_hash_at_checkpoint_passes() {
        let mut checkpoints = Checkpoints::new();
        let hash = fast_hash(b"block 100");
        checkpoints.add(100, hash);
        assert_eq!(checkpoints.check_block(100, hash), Some(true));
        assert_eq!(checkpoints.check_block(100, fast_hash(b"other")), Some(false));
    }

    #[test]
    fn heights_at_or_below_highest_checkpoint_are_in_zone() {
        let mut checkpoints = Checkpoints::new();
        checkpoints.add(500, fast_hash(b"cp"));
        assert!(checkpoints.is_in_checkpoint_zone(10));
        assert!(checkpoints.is_in_checkpoint_zone(500));
        assert!(!checkpoints.is_in_checkpoint_zone(501));
    }

    #[test]
    fn conflicting_add_is_rejected() {
        let mut checkpoints = Checkpoints::new();
        let hash = fast_hash(b"a");
        assert!(checkpoints.add(10, hash));
        assert!(!checkpoints.add(10, fast_hash(b"b")));
    }
}
