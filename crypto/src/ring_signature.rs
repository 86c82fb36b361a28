use curve25519_dalek::{constants::ED25519_BASEPOINT_TABLE, scalar::Scalar};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{
    error::CryptoError,
    hash::{fast_hash, Hash},
    keys::{hash_to_point, hash_to_scalar, PublicKey, SecretKey},
};

/// One (c, r) pair per ring member, in ring order. This is the classic
/// CryptoNote one-time ring signature (a ring of Schnorr-like proofs tied
/// together by a single Fiat-Shamir challenge), not the later MLSAG/CLSAG
/// schemes — the reference daemon this was ported from predates both.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct RingSignature {
    entries: Vec<SignatureEntry>,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
struct SignatureEntry {
    #[serde(with = "scalar_bytes")]
    c: Scalar,
    #[serde(with = "scalar_bytes")]
    r: Scalar,
}

impl RingSignature {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Produces a ring signature proving knowledge of the secret key behind
/// exactly one of `ring`, at position `secret_index`, without revealing
/// which, while binding the proof to `key_image` and `prefix_hash` (the
/// hash of the spending transaction's prefix).
pub fn generate_ring_signature<R: RngCore + CryptoRng>(
    prefix_hash: &Hash,
    key_image: &PublicKey,
    ring: &[PublicKey],
    secret_index: usize,
    secret: &SecretKey,
    rng: &mut R,
) -> Result<RingSignature, CryptoError> {
    if ring.is_empty() || secret_index >= ring.len() {
        return Err(CryptoError::RingSizeMismatch { sig_len: 0, ring_len: ring.len() });
    }

    let image_point = key_image.decompress()?;
    let n = ring.len();
    let mut c = vec![Scalar::zero(); n];
    let mut r = vec![Scalar::zero(); n];

    let mut buf = Vec::with_capacity(32 + n * 64);
    buf.extend_from_slice(prefix_hash.as_bytes());

    let q_sec = random_scalar(rng);
    let l_sec = &q_sec * &ED25519_BASEPOINT_TABLE;
    let h_p_sec = hash_to_point(&ring[secret_index].to_bytes());
    let r_sec = q_sec * h_p_sec;

    // Reserve space for every (L_i, R_i) pair; the secret index's pair is
    // filled in once q_sec's contribution is known, decoys are filled
    // immediately since their c_i, r_i are chosen freely.
    let mut l_points = vec![l_sec.compress(); n];
    let mut r_points = vec![r_sec.compress(); n];

    let mut sum_of_decoy_c = Scalar::zero();
    for i in 0..n {
        if i == secret_index {
            continue;
        }
        let c_i = random_scalar(rng);
        let r_i = random_scalar(rng);
        let pubkey_point = ring[i].decompress()?;
        let h_p_i = hash_to_point(&ring[i].to_bytes());
        let l_i = &r_i * &ED25519_BASEPOINT_TABLE + c_i * pubkey_point;
        let r_i_point = r_i * h_p_i + c_i * image_point;
        l_points[i] = l_i.compress();
        r_points[i] = r_i_point.compress();
        c[i] = c_i;
        r[i] = r_i;
        sum_of_decoy_c += c_i;
    }

    for i in 0..n {
        buf.extend_from_slice(l_points[i].as_bytes());
        buf.extend_from_slice(r_points[i].as_bytes());
    }
    let challenge = hash_to_scalar(&buf);

    let c_sec = challenge - sum_of_decoy_c;
    let r_sec_scalar = q_sec - c_sec * secret.as_scalar();
    c[secret_index] = c_sec;
    r[secret_index] = r_sec_scalar;

    let entries = c.into_iter().zip(r).map(|(c, r)| SignatureEntry { c, r }).collect();
    Ok(RingSignature { entries })
}

/// Verifies a ring signature against `prefix_hash`, `key_image` and the
/// public keys in `ring`. Returns `Ok(false)` (rather than an error) for a
/// cryptographically well-formed but invalid signature; returns `Err` only
/// when an input is structurally malformed (wrong ring length, bad point).
pub fn check_ring_signature(
    prefix_hash: &Hash,
    key_image: &PublicKey,
    ring: &[PublicKey],
    signature: &RingSignature,
) -> Result<bool, CryptoError> {
    if signature.len() != ring.len() {
        return Err(CryptoError::RingSizeMismatch { sig_len: signature.len(), ring_len: ring.len() });
    }
    if ring.is_empty() {
        return Err(CryptoError::RingSizeMismatch { sig_len: 0, ring_len: 0 });
    }

    let image_point = key_image.decompress()?;
    let mut buf = Vec::with_capacity(32 + ring.len() * 64);
    buf.extend_from_slice(prefix_hash.as_bytes());

    let mut sum_of_c = Scalar::zero();
    let mut pairs = Vec::with_capacity(ring.len());
    for (pubkey, entry) in ring.iter().zip(signature.entries.iter()) {
        let pubkey_point = pubkey.decompress()?;
        let h_p = hash_to_point(&pubkey.to_bytes());
        let l_i = &entry.r * &ED25519_BASEPOINT_TABLE + entry.c * pubkey_point;
        let r_i = entry.r * h_p + entry.c * image_point;
        sum_of_c += entry.c;
        pairs.push((l_i.compress(), r_i.compress()));
    }
    for (l, r) in &pairs {
        buf.extend_from_slice(l.as_bytes());
        buf.extend_from_slice(r.as_bytes());
    }

    let challenge = hash_to_scalar(&buf);
    Ok(challenge == sum_of_c)
}

fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    let mut bytes = [0u8; 64];
    rng.fill_bytes(&mut bytes);
    Scalar::from_bytes_mod_order_wide(&bytes)
}

/// Hashes a transaction prefix's serialized bytes into the hash that ring
/// signatures and key images are bound to.
pub fn prefix_hash(serialized_prefix: &[u8]) -> Hash {
    fast_hash(serialized_prefix)
}

mod scalar_bytes {
    use curve25519_dalek::scalar::Scalar;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(scalar: &Scalar, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(scalar.as_bytes())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Scalar, D::Error> {
        let bytes: [u8; 32] = serde::de::Deserialize::deserialize(deserializer)?;
        Option::from(Scalar::from_canonical_bytes(bytes)).ok_or_else(|| D::Error::custom("non-canonical scalar"))
    }
}
