use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;

use crate::{
    keys::{hash_to_point, PublicKey, SecretKey},
    CryptoError,
};

/// Derives the key image `I = x * Hp(P)` for a one-time output, where `x`
/// is the output's spend secret and `P` its corresponding public key.
/// Every transaction input carries the key image of the output it spends;
/// two inputs sharing a key image is conclusive proof of a double spend,
/// since `Hp` is deterministic in `P` and `x` is only known to the owner.
pub fn generate_key_image(secret: &SecretKey, public: &PublicKey) -> Result<PublicKey, CryptoError> {
    let h_p = hash_to_point(&public.to_bytes());
    let image_point = secret.as_scalar() * h_p;
    Ok(PublicKey::from(image_point))
}

/// Sanity-checks that `image` is actually `secret * Hp(public)`, used in
/// tests and wallet-side verification before broadcasting a transaction.
pub fn verify_key_image(secret: &SecretKey, public: &PublicKey, image: &PublicKey) -> Result<bool, CryptoError> {
    Ok(generate_key_image(secret, public)? == *image)
}

/// Computes the public key corresponding to `secret`, i.e. `secret * G`.
/// Exposed alongside key-image derivation since both are building blocks
/// for one-time output key derivation during ring signing.
pub fn secret_to_public(secret: &SecretKey) -> PublicKey {
    PublicKey::from(secret.as_scalar() * &ED25519_BASEPOINT_TABLE)
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;

    #[test]
    fn key_image_is_deterministic_in_the_secret() {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        let image1 = generate_key_image(&secret, &public).unwrap();
        let image2 = generate_key_image(&secret, &public).unwrap();
        assert_eq!(image1, image2);
    }

    #[test]
    fn different_secrets_yield_different_key_images() {
        let secret_a = SecretKey::random(&mut OsRng);
        let secret_b = SecretKey::random(&mut OsRng);
        let public_a = secret_a.public_key();
        let image_a = generate_key_image(&secret_a, &public_a).unwrap();
        let image_b = generate_key_image(&secret_b, &public_a).unwrap();
        assert_ne!(image_a, image_b);
    }

    #[test]
    fn verify_key_image_rejects_wrong_secret() {
        let secret = SecretKey::random(&mut OsRng);
        let other = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        let image = generate_key_image(&secret, &public).unwrap();
        assert!(!verify_key_image(&other, &public, &image).unwrap());
    }
}
