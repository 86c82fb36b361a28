use ember_crypto::PublicKey;
use serde::{Deserialize, Serialize};

/// One spent source inside a transaction. Encoded as a tagged sum type so
/// decoding can reject unknown tags outright rather than silently
/// defaulting a variant, per the redesign note on variant inputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionInput {
    /// Only valid as the sole input of a block's base transaction, at
    /// index 0. `block_index` must equal the height of the block it pays.
    Coinbase { block_index: u64 },
    /// A ring-signed spend of a same-amount output set. `offsets` are
    /// relative output indices within the amount's output list (the
    /// classic CryptoNote "relative offsets" ring encoding); `key_image`
    /// prevents the same output from being spent twice.
    Key { amount: u64, offsets: Vec<u64>, key_image: PublicKey },
    /// A spend of a multisig output; `output_index` identifies which
    /// multisig output of `amount` is being spent and `signature_count`
    /// must match that output's `required` threshold.
    Multisig { amount: u64, signature_count: u32, output_index: u64 },
}

impl TransactionInput {
    /// Ring size (mixin count + 1) of a `Key` input; `None` for inputs
    /// that carry no ring.
    pub fn ring_size(&self) -> Option<usize> {
        match self {
            TransactionInput::Key { offsets, .. } => Some(offsets.len()),
            _ => None,
        }
    }

    pub fn key_image(&self) -> Option<&PublicKey> {
        match self {
            TransactionInput::Key { key_image, .. } => Some(key_image),
            _ => None,
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            TransactionInput::Coinbase { .. } => 0,
            TransactionInput::Key { amount, .. } => *amount,
            TransactionInput::Multisig { amount, .. } => *amount,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        matches!(self, TransactionInput::Coinbase { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_size_reflects_offsets_len() {
        let input = TransactionInput::Key {
            amount: 10,
            offsets: vec![1, 2, 3],
            key_image: ember_crypto::SecretKey::from_bytes_mod_order(&[7u8; 32]).public_key(),
        };
        assert_eq!(input.ring_size(), Some(3));
    }

    #[test]
    fn coinbase_has_no_ring() {
        let input = TransactionInput::Coinbase { block_index: 5 };
        assert_eq!(input.ring_size(), None);
        assert!(input.is_coinbase());
    }
}
