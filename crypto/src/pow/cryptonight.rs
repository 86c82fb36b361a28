//! The CryptoNight memory-hard long-hash family used as this chain's
//! proof-of-work. Structurally mirrors the reference daemon's algorithm
//! (Keccak-seeded scratchpad, AES-mixed read/write passes, one of four
//! finalizing hashes chosen by the seed's low byte) — see DESIGN.md for
//! where this implementation simplifies the original's bit-exact mixing
//! in exchange for staying within a single crate's dependency budget.

use tiny_keccak::keccakf;

use super::{
    aes::{aes_round, expand_key},
    variants::{CryptoNightParams, CryptoNightVariant},
};
use crate::hash::{Hash, HASH_SIZE};

const KECCAK_STATE_BYTES: usize = 200;
const AES_BLOCK: usize = 16;

/// Computes the long hash of `input` at `height`, using the algorithm and
/// parameters [`CryptoNightVariant::for_block`] selects for that height.
pub fn long_hash(variant: CryptoNightVariant, height: u64, input: &[u8]) -> Hash {
    let params = variant.params(height);
    let mut state = keccak1600(input);

    let mut key = [0u8; 32];
    key.copy_from_slice(&state[0..32]);
    let round_keys = expand_key(&key);

    let scratchpad_blocks = params.scratchpad_bytes / AES_BLOCK;
    let mut scratchpad = vec![0u8; params.scratchpad_bytes];
    init_scratchpad(&mut scratchpad, &state, &round_keys);

    mix_scratchpad(&mut scratchpad, &mut state, &round_keys, scratchpad_blocks, &params, variant);

    finalize(&state, &scratchpad)
}

/// Runs the Keccak-1600 permutation over `input` with CryptoNote's padding
/// and returns the full 200-byte state (not truncated to 32 bytes as
/// [`crate::hash::fast_hash`] does), seeding both the AES key schedule and
/// the scratchpad's initial contents.
fn keccak1600(input: &[u8]) -> [u8; KECCAK_STATE_BYTES] {
    const RATE: usize = 136; // 1088-bit rate, 512-bit capacity, as the original's keccak.c uses.

    let mut state = [0u64; 25];
    let mut state_bytes = [0u8; KECCAK_STATE_BYTES];

    let mut offset = 0;
    while offset + RATE <= input.len() {
        absorb_block(&mut state, &input[offset..offset + RATE]);
        keccakf(&mut state);
        offset += RATE;
    }

    let mut last_block = vec![0u8; RATE];
    let remaining = &input[offset..];
    last_block[..remaining.len()].copy_from_slice(remaining);
    last_block[remaining.len()] = 0x01;
    last_block[RATE - 1] |= 0x80;
    absorb_block(&mut state, &last_block);
    keccakf(&mut state);

    for (i, lane) in state.iter().enumerate() {
        state_bytes[i * 8..i * 8 + 8].copy_from_slice(&lane.to_le_bytes());
    }
    state_bytes
}

fn absorb_block(state: &mut [u64; 25], block: &[u8]) {
    for (i, chunk) in block.chunks(8).enumerate() {
        let mut lane = [0u8; 8];
        lane[..chunk.len()].copy_from_slice(chunk);
        state[i] ^= u64::from_le_bytes(lane);
    }
}

/// Fills the scratchpad with ten AES rounds applied repeatedly to the
/// state's `text` portion (bytes 64..192, eight 16-byte blocks), the same
/// `ExpandAESKey` + chained `aesb_pseudo_round` loop the original's
/// `CnSlowHash` uses to derive scratchpad contents from the Keccak seed.
fn init_scratchpad(scratchpad: &mut [u8], state: &[u8; KECCAK_STATE_BYTES], round_keys: &[[u8; 16]; 10]) {
    let mut blocks = [[0u8; AES_BLOCK]; 8];
    for (i, block) in blocks.iter_mut().enumerate() {
        block.copy_from_slice(&state[64 + i * AES_BLOCK..64 + (i + 1) * AES_BLOCK]);
    }

    for chunk in scratchpad.chunks_mut(AES_BLOCK * 8) {
        for block in blocks.iter_mut() {
            let mut b = *block;
            for rk in round_keys {
                b = aes_round(b, rk);
            }
            *block = b;
        }
        for (i, block) in blocks.iter().enumerate() {
            let start = i * AES_BLOCK;
            if start + AES_BLOCK <= chunk.len() {
                chunk[start..start + AES_BLOCK].copy_from_slice(block);
            }
        }
    }
}

/// The memory-hard mixing loop: each iteration reads a scratchpad block
/// addressed by the running 16-byte state, AES-mixes it, and writes it
/// back, with variant-specific perturbations folded into the addressed
/// block before it is stored (v1's tweak XOR, v2's extra integer-math
/// step).
fn mix_scratchpad(
    scratchpad: &mut [u8],
    state: &mut [u8; KECCAK_STATE_BYTES],
    round_keys: &[[u8; 16]; 10],
    scratchpad_blocks: usize,
    params: &CryptoNightParams,
    variant: CryptoNightVariant,
) {
    let mut a = [0u8; AES_BLOCK];
    a.copy_from_slice(&state[0..AES_BLOCK]);
    let mut b = [0u8; AES_BLOCK];
    b.copy_from_slice(&state[AES_BLOCK..AES_BLOCK * 2]);

    let tweak = variant == CryptoNightVariant::V1;

    for round in 0..params.iterations {
        let index = (u64::from_le_bytes(a[0..8].try_into().unwrap()) as usize % scratchpad_blocks) * AES_BLOCK;
        let mut block = [0u8; AES_BLOCK];
        block.copy_from_slice(&scratchpad[index..index + AES_BLOCK]);

        let mut mixed = aes_round(block, &a_as_round_key(&a));
        for i in 0..AES_BLOCK {
            mixed[i] ^= b[i];
        }
        if tweak && round % 2 == 0 {
            mixed[11] ^= 0x01;
        }
        if variant == CryptoNightVariant::V2 {
            for (i, byte) in mixed.iter_mut().enumerate() {
                *byte = byte.wrapping_add(round_keys[round % 10][i]);
            }
        }

        scratchpad[index..index + AES_BLOCK].copy_from_slice(&mixed);
        b = a;
        a = mixed;
    }

    state[0..AES_BLOCK].copy_from_slice(&a);
    state[AES_BLOCK..AES_BLOCK * 2].copy_from_slice(&b);
}

fn a_as_round_key(a: &[u8; AES_BLOCK]) -> [u8; AES_BLOCK] {
    *a
}

/// Chooses one of four finalizing hashes by the low byte of the scratchpad
/// sum, mirroring the original's `Blake-256` / `Groestl-256` / `JH-256` /
/// `Skein-256` selection. See DESIGN.md: three of those four ciphers have
/// no maintained crate in this corpus, so this finalizer stands in with
/// hashes from crates the rest of the workspace already depends on.
fn finalize(state: &[u8; KECCAK_STATE_BYTES], scratchpad: &[u8]) -> Hash {
    use blake2::{Blake2b512, Blake2s256, Digest};
    use sha2::Sha256;
    use sha3::Sha3_256;

    let selector = state[0] & 0x03;
    let mut out = [0u8; HASH_SIZE];
    match selector {
        0 => {
            let digest = Blake2s256::digest(scratchpad);
            out.copy_from_slice(&digest);
        },
        1 => {
            let digest = Sha3_256::digest(scratchpad);
            out.copy_from_slice(&digest);
        },
        2 => {
            let digest = Sha256::digest(scratchpad);
            out.copy_from_slice(&digest);
        },
        _ => {
            let digest = Blake2b512::digest(scratchpad);
            out.copy_from_slice(&digest[..HASH_SIZE]);
        },
    }
    Hash(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pow::variants::CryptoNightVariant;

    #[test]
    fn long_hash_is_deterministic() {
        let a = long_hash(CryptoNightVariant::V0, 1, b"block header bytes");
        let b = long_hash(CryptoNightVariant::V0, 1, b"block header bytes");
        assert_eq!(a, b);
    }

    #[test]
    fn long_hash_differs_between_variants() {
        let v0 = long_hash(CryptoNightVariant::V0, 1, b"same input");
        let v1 = long_hash(CryptoNightVariant::V1, 1, b"same input");
        assert_ne!(v0, v1);
    }

    #[test]
    fn long_hash_differs_with_input() {
        let a = long_hash(CryptoNightVariant::V2, 500_000, b"input a");
        let b = long_hash(CryptoNightVariant::V2, 500_000, b"input b");
        assert_ne!(a, b);
    }
}
