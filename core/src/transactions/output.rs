use ember_crypto::PublicKey;
use serde::{Deserialize, Serialize};

/// The spending condition attached to an output's amount.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputTarget {
    Key { pubkey: PublicKey },
    Multisig { keys: Vec<PublicKey>, required: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub amount: u64,
    pub target: OutputTarget,
}

impl TransactionOutput {
    pub fn key(amount: u64, pubkey: PublicKey) -> Self {
        TransactionOutput { amount, target: OutputTarget::Key { pubkey } }
    }

    /// `amount > 0` and, for a `Key` target, the target is already a
    /// checked valid curve point by construction (`PublicKey` can only be
    /// built from a decompressible point).
    pub fn is_well_formed(&self) -> bool {
        match &self.target {
            OutputTarget::Key { .. } => self.amount > 0,
            OutputTarget::Multisig { keys, required } => {
                self.amount > 0 && *required > 0 && (*required as usize) <= keys.len()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use ember_crypto::SecretKey;

    use super::*;

    #[test]
    fn zero_amount_output_is_not_well_formed() {
        let pubkey = SecretKey::from_bytes_mod_order(&[3u8; 32]).public_key();
        let output = TransactionOutput::key(0, pubkey);
        assert!(!output.is_well_formed());
    }

    #[test]
    fn positive_amount_key_output_is_well_formed() {
        let pubkey = SecretKey::from_bytes_mod_order(&[3u8; 32]).public_key();
        let output = TransactionOutput::key(100, pubkey);
        assert!(output.is_well_formed());
    }

    #[test]
    fn multisig_output_requires_sane_threshold() {
        let pubkey = SecretKey::from_bytes_mod_order(&[3u8; 32]).public_key();
        let output = TransactionOutput {
            amount: 50,
            target: OutputTarget::Multisig { keys: vec![pubkey], required: 2 },
        };
        assert!(!output.is_well_formed());
    }
}
