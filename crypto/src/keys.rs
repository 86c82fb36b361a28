use curve25519_dalek::{
    constants::ED25519_BASEPOINT_TABLE,
    edwards::{CompressedEdwardsY, EdwardsPoint},
    scalar::Scalar,
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{error::CryptoError, hash::fast_hash};

/// A scalar in the ed25519 group's scalar field. Backs both spend/view
/// secret keys and the per-signature random scalars used in ring
/// signatures.
#[derive(Clone, Serialize, Deserialize)]
pub struct SecretKey(#[serde(with = "scalar_bytes")] Scalar);

impl SecretKey {
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 64];
        rng.fill_bytes(&mut bytes);
        SecretKey(Scalar::from_bytes_mod_order_wide(&bytes))
    }

    /// Reduces an arbitrary 32-byte string into the scalar field. Used to
    /// derive a spend/view key pair deterministically from a seed.
    pub fn from_bytes_mod_order(bytes: &[u8; 32]) -> Self {
        SecretKey(Scalar::from_bytes_mod_order(*bytes))
    }

    pub fn from_canonical_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        Scalar::from_canonical_bytes(bytes)
            .map(SecretKey)
            .ok_or(CryptoError::InvalidScalar)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn as_scalar(&self) -> &Scalar {
        &self.0
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey((&self.0 * &ED25519_BASEPOINT_TABLE).compress())
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.0 = Scalar::zero();
    }
}

/// A point on the ed25519 curve, stored in compressed form. Used for
/// public spend/view keys, one-time output keys and key images.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "point_bytes")] CompressedEdwardsY);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let compressed = CompressedEdwardsY(bytes);
        // Validate eagerly: a point that fails to decompress is rejected at
        // the boundary rather than surfacing as a signature failure later.
        compressed.decompress().ok_or(CryptoError::InvalidPoint)?;
        Ok(PublicKey(compressed))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn decompress(&self) -> Result<EdwardsPoint, CryptoError> {
        self.0.decompress().ok_or(CryptoError::InvalidPoint)
    }
}

impl From<EdwardsPoint> for PublicKey {
    fn from(point: EdwardsPoint) -> Self {
        PublicKey(point.compress())
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

/// Reduces an arbitrary-length message into a scalar, the building block
/// for both Fiat-Shamir signature challenges and key derivation.
pub fn hash_to_scalar(data: &[u8]) -> Scalar {
    Scalar::from_bytes_mod_order(*fast_hash(data).as_bytes())
}

/// Maps arbitrary data onto a curve point via try-and-increment: hash the
/// input, attempt to decompress the digest as a compressed point, and on
/// failure rehash with an incrementing counter appended until a valid
/// point is found. The result is then cleared of cofactor by multiplying
/// by 8, matching the reference daemon's `hash_to_ec`.
pub fn hash_to_point(data: &[u8]) -> EdwardsPoint {
    let mut counter: u64 = 0;
    loop {
        let mut preimage = Vec::with_capacity(data.len() + 8);
        preimage.extend_from_slice(data);
        preimage.extend_from_slice(&counter.to_le_bytes());
        let digest = fast_hash(&preimage);
        if let Some(point) = CompressedEdwardsY(*digest.as_bytes()).decompress() {
            return point.mul_by_cofactor();
        }
        counter += 1;
    }
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

mod point_bytes {
    use curve25519_dalek::edwards::CompressedEdwardsY;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(point: &CompressedEdwardsY, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(point.as_bytes())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CompressedEdwardsY, D::Error> {
        let bytes: [u8; 32] = serde::de::Deserialize::deserialize(deserializer)?;
        Ok(CompressedEdwardsY(bytes))
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;

    #[test]
    fn secret_key_derives_matching_public_key() {
        let sk = SecretKey::random(&mut OsRng);
        let pk = sk.public_key();
        assert!(pk.decompress().is_ok());
    }

    #[test]
    fn public_key_roundtrips_through_bytes() {
        let sk = SecretKey::random(&mut OsRng);
        let pk = sk.public_key();
        let restored = PublicKey::from_bytes(pk.to_bytes()).unwrap();
        assert_eq!(pk, restored);
    }

    #[test]
    fn non_canonical_point_bytes_are_rejected() {
        // 0x01 repeated is not a valid compressed Edwards point.
        let bytes = [0x01u8; 32];
        assert!(PublicKey::from_bytes(bytes).is_err());
    }

    #[test]
    fn hash_to_scalar_is_deterministic() {
        assert_eq!(hash_to_scalar(b"x"), hash_to_scalar(b"x"));
    }

    #[test]
    fn hash_to_point_yields_valid_curve_point() {
        let point = hash_to_point(b"key image seed");
        assert_eq!(point.compress().decompress().unwrap(), point);
    }
}
