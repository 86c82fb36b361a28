use ember_crypto::{fast_hash, Hash, RingSignature};
use serde::{Deserialize, Serialize};

use super::{extra::public_key_from_extra, input::TransactionInput, output::TransactionOutput};

/// The unsigned body of a transaction: everything a ring signature is
/// computed over. Kept as a plain struct — not a base class `Transaction`
/// inherits from — so `prefix_hash()` is a pure function of these fields
/// alone, per the composition-over-inheritance redesign note.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPrefix {
    pub version: u8,
    pub unlock_time: u64,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub extra: Vec<u8>,
}

impl TransactionPrefix {
    pub fn prefix_hash(&self) -> Hash {
        let bytes = bincode::serialize(self).expect("TransactionPrefix serialization is infallible");
        fast_hash(&bytes)
    }

    pub fn is_coinbase(&self) -> bool {
        matches!(self.inputs.first(), Some(TransactionInput::Coinbase { .. })) && self.inputs.len() == 1
    }

    pub fn total_output_amount(&self) -> Option<u64> {
        self.outputs.iter().try_fold(0u64, |acc, o| acc.checked_add(o.amount))
    }

    pub fn total_input_amount(&self) -> Option<u64> {
        self.inputs.iter().try_fold(0u64, |acc, i| acc.checked_add(i.amount()))
    }

    pub fn public_key(&self) -> Option<ember_crypto::PublicKey> {
        public_key_from_extra(&self.extra)
    }
}

/// A complete transaction: a prefix plus one ring signature per `Key`
/// input, composed rather than inherited. `hash` is the whole-transaction
/// hash used as a Merkle leaf; `prefix_hash` (recomputed, not stored) is
/// what every ring signature is bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub prefix: TransactionPrefix,
    pub signatures: Vec<RingSignature>,
    hash: Hash,
}

impl Transaction {
    pub fn new(prefix: TransactionPrefix, signatures: Vec<RingSignature>) -> Self {
        let hash = compute_hash(&prefix, &signatures);
        Transaction { prefix, signatures, hash }
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn prefix_hash(&self) -> Hash {
        self.prefix.prefix_hash()
    }

    /// The ring signature bound to input `index`, if that input carries
    /// one (coinbase inputs never do).
    pub fn signature_for_input(&self, index: usize) -> Option<&RingSignature> {
        self.signatures.get(index)
    }

    pub fn fee(&self) -> Option<u64> {
        let input_total = self.prefix.total_input_amount()?;
        let output_total = self.prefix.total_output_amount()?;
        input_total.checked_sub(output_total)
    }

    /// `true` if every `Key` input's key image is distinct within this
    /// transaction, a structural rule checked before ring signatures are
    /// even verified.
    pub fn key_images_are_unique(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.prefix.inputs.iter().filter_map(|i| i.key_image()).all(|ki| seen.insert(ki.to_bytes()))
    }

    /// Approximate wire size in bytes, used for block-size median and
    /// fee-per-byte pool ordering.
    pub fn serialized_size(&self) -> usize {
        bincode::serialized_size(&self.prefix).unwrap_or(0) as usize
            + self.signatures.iter().map(|_| 64).sum::<usize>()
    }
}

fn compute_hash(prefix: &TransactionPrefix, signatures: &[RingSignature]) -> Hash {
    let mut bytes = bincode::serialize(prefix).expect("TransactionPrefix serialization is infallible");
    bytes.extend(bincode::serialize(signatures).expect("signature serialization is infallible"));
    fast_hash(&bytes)
}

/// Wire-shape shadow used purely for `serde` round-tripping; the cached
/// `hash` is never trusted from the wire, it is always recomputed on
/// deserialize so decode(encode(x)) == x holds without smuggling a stale
/// cache across a network boundary.
#[derive(Serialize, Deserialize)]
struct TransactionWire {
    prefix: TransactionPrefix,
    signatures: Vec<RingSignature>,
}

impl Serialize for Transaction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TransactionWire { prefix: self.prefix.clone(), signatures: self.signatures.clone() }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Transaction {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = TransactionWire::deserialize(deserializer)?;
        Ok(Transaction::new(wire.prefix, wire.signatures))
    }
}

#[cfg(test)]
mod tests {
    use ember_crypto::SecretKey;

    use super::*;

    fn coinbase_prefix(height: u64, reward: u64) -> TransactionPrefix {
        let pubkey = SecretKey::from_bytes_mod_order(&[1u8; 32]).public_key();
        TransactionPrefix {
            version: 1,
            unlock_time: height + 60,
            inputs: vec![TransactionInput::Coinbase { block_index: height }],
            outputs: vec![TransactionOutput::key(reward, pubkey)],
            extra: Vec::new(),
        }
    }

    #[test]
    fn hash_is_deterministic() {
        let prefix = coinbase_prefix(10, 1000);
        let tx1 = Transaction::new(prefix.clone(), vec![]);
        let tx2 = Transaction::new(prefix, vec![]);
        assert_eq!(tx1.hash(), tx2.hash());
    }

    #[test]
    fn serialization_round_trips() {
        let prefix = coinbase_prefix(42, 5000);
        let tx = Transaction::new(prefix, vec![]);
        let bytes = bincode::serialize(&tx).unwrap();
        let decoded: Transaction = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.hash(), tx.hash());
    }

    #[test]
    fn coinbase_prefix_is_recognized() {
        let prefix = coinbase_prefix(1, 100);
        assert!(prefix.is_coinbase());
    }

    #[test]
    fn fee_is_inputs_minus_outputs() {
        let pubkey = SecretKey::from_bytes_mod_order(&[2u8; 32]).public_key();
        let key_image = SecretKey::from_bytes_mod_order(&[3u8; 32]).public_key();
        let prefix = TransactionPrefix {
            version: 1,
            unlock_time: 0,
            inputs: vec![TransactionInput::Key { amount: 100, offsets: vec![1, 2], key_image }],
            outputs: vec![TransactionOutput::key(90, pubkey)],
            extra: Vec::new(),
        };
        let tx = Transaction::new(prefix, vec![]);
        assert_eq!(tx.fee(), Some(10));
    }
}
