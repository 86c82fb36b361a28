//! One-time output key derivation, the Diffie-Hellman mechanism a wallet
//! uses to recognize and spend the outputs addressed to it without a
//! third party ever learning which outputs those are. Grounded on
//! `original_source`'s `Crypto::generateKeyDerivation`/`underivePublicKey`
//! (see `CryptoTest/main.cpp` and `CryptoNoteCore/CryptoNoteFormatUtils.h`).

use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::edwards::CompressedEdwardsY;
use integer_encoding::VarInt;

use crate::{
    keys::{hash_to_scalar, PublicKey, SecretKey},
    CryptoError,
};

/// `D = 8 * a * R`, the shared secret a transaction's public key `R` and a
/// wallet's view secret `a` establish. Cofactor-cleared the same way
/// [`crate::key_image::generate_key_image`] clears `Hp(P)`, so it agrees
/// with a peer who derives the same point as `8 * r * A` from the other side.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KeyDerivation(CompressedEdwardsY);

impl KeyDerivation {
    pub fn to_bytes(self) -> [u8; 32] {
        self.0.to_bytes()
    }
}

impl std::fmt::Debug for KeyDerivation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyDerivation({})", hex::encode(self.to_bytes()))
    }
}

/// Establishes the shared derivation between a transaction's public key
/// and a wallet's view secret. Either side can compute the same point:
/// the wallet from `(tx_public_key, view_secret)`, the sender from
/// `(view_public_key, tx_secret)`.
pub fn generate_key_derivation(tx_public_key: &PublicKey, view_secret: &SecretKey) -> Result<KeyDerivation, CryptoError> {
    let point = tx_public_key.decompress()?;
    let shared = (view_secret.as_scalar() * point).mul_by_cofactor();
    Ok(KeyDerivation(shared.compress()))
}

/// Recovers the one-time public key `P' = Hs(D ‖ idx) * G + B` an output
/// at `output_index` would carry if it belongs to the account whose spend
/// public key is `base_spend_key`. A wallet scanning a block compares this
/// against each output's actual key; a match means the output is theirs.
pub fn derive_output_public_key(
    derivation: &KeyDerivation,
    output_index: u64,
    base_spend_key: &PublicKey,
) -> Result<PublicKey, CryptoError> {
    let scalar = derivation_to_scalar(derivation, output_index);
    let base = base_spend_key.decompress()?;
    Ok(PublicKey::from(&scalar * &ED25519_BASEPOINT_TABLE + base))
}

fn derivation_to_scalar(derivation: &KeyDerivation, output_index: u64) -> curve25519_dalek::scalar::Scalar {
    let mut preimage = Vec::with_capacity(32 + 10);
    preimage.extend_from_slice(&derivation.to_bytes());
    preimage.extend_from_slice(&output_index.encode_var_vec());
    hash_to_scalar(&preimage)
}
