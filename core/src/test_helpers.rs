//! Block and transaction builders for tests, grounded on the teacher's
//! `tari_core::test_utils::builders` pattern of small, composable
//! construction helpers rather than full-blown fixture files.

use ember_crypto::{generate_ring_signature, PublicKey, SecretKey};

use crate::{
    blocks::{Block, BlockHeader},
    transactions::{Transaction, TransactionInput, TransactionOutput, TransactionPrefix},
    validation::pow_meets_difficulty,
};

pub fn keypair(seed: u8) -> (SecretKey, PublicKey) {
    let secret = SecretKey::from_bytes_mod_order(&[seed; 32]);
    let public = secret.public_key();
    (secret, public)
}

pub fn coinbase_transaction(height: u64, reward: u64, pubkey: PublicKey) -> Transaction {
    let prefix = TransactionPrefix {
        version: 1,
        unlock_time: height + 60,
        inputs: vec![TransactionInput::Coinbase { block_index: height }],
        outputs: vec![TransactionOutput::key(reward, pubkey)],
        extra: Vec::new(),
    };
    Transaction::new(prefix, vec![])
}

/// Builds a one-input spend transaction with a genuine ring signature, so
/// it passes [`crate::validation::validate_transaction`] rather than only
/// being well-formed. `validate_transaction` reconstructs its ring as the
/// key image repeated once per offset (real output-key resolution lives
/// in storage, out of scope here), so the signing secret must be the
/// discrete log of `key_image` itself rather than of a separate one-time
/// output key.
pub fn spend_transaction(key_image_seed: u8, output_pubkey: PublicKey, amount: u64, fee: u64) -> Transaction {
    let (secret, key_image) = keypair(key_image_seed);
    let offsets = vec![1u64, 2, 3];
    let ring = vec![key_image; offsets.len()];
    let prefix = TransactionPrefix {
        version: 1,
        unlock_time: 0,
        inputs: vec![TransactionInput::Key { amount: amount + fee, offsets, key_image }],
        outputs: vec![TransactionOutput::key(amount, output_pubkey)],
        extra: Vec::new(),
    };
    let prefix_hash = prefix.prefix_hash();
    let signature =
        generate_ring_signature(&prefix_hash, &key_image, &ring, 0, &secret, &mut rand::thread_rng()).unwrap();
    Transaction::new(prefix, vec![signature])
}

/// Re-signs `prefix` (a `spend_transaction` prefix, possibly edited) under
/// the same key image secret, for tests that need two distinct
/// transactions sharing one key image.
pub fn sign_spend_prefix(key_image_seed: u8, prefix: TransactionPrefix) -> Transaction {
    let (secret, key_image) = keypair(key_image_seed);
    let offsets = match prefix.inputs.first() {
        Some(TransactionInput::Key { offsets, .. }) => offsets.clone(),
        _ => panic!("sign_spend_prefix expects a single Key input"),
    };
    let ring = vec![key_image; offsets.len()];
    let prefix_hash = prefix.prefix_hash();
    let signature =
        generate_ring_signature(&prefix_hash, &key_image, &ring, 0, &secret, &mut rand::thread_rng()).unwrap();
    Transaction::new(prefix, vec![signature])
}

pub fn block_header(
    major_version: u8,
    timestamp: u64,
    previous_block_hash: ember_crypto::Hash,
    nonce: u32,
) -> BlockHeader {
    BlockHeader { major_version, minor_version: 0, timestamp, previous_block_hash, nonce, parent_block: None }
}

pub fn genesis_block(reward: u64) -> Block {
    let (_, pubkey) = keypair(1);
    let header = block_header(1, 1_700_000_000, ember_crypto::Hash::ZERO, 0);
    Block::new(header, coinbase_transaction(0, reward, pubkey), vec![], 0, None)
}

/// Builds a block extending `previous` and searches nonces until one
/// satisfies `difficulty`, the way [`crate::chain::Blockchain::add_block`]
/// requires. Mirrors the node binary's own miner loop rather than taking
/// a fixed nonce, since the chain's bootstrap difficulty is rarely 1.
pub fn next_block(
    previous: &Block,
    height: u64,
    timestamp: u64,
    transaction_hashes: Vec<ember_crypto::Hash>,
    reward: u64,
    difficulty: u128,
) -> Block {
    let (_, pubkey) = keypair(height as u8 + 2);
    let coinbase = coinbase_transaction(height, reward, pubkey);
    for nonce in 0..200_000u32 {
        let header = block_header(previous.header.major_version, timestamp, previous.hash(), nonce);
        let block = Block::new(header, coinbase.clone(), transaction_hashes.clone(), height, None);
        if pow_meets_difficulty(block.long_hash(), difficulty) {
            return block;
        }
    }
    panic!("no nonce under 200_000 satisfies difficulty {difficulty}");
}
