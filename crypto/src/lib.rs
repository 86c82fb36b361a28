//! Elliptic-curve primitives, one-time ring signatures and CryptoNight
//! proof-of-work, the cryptographic layer every other Ember crate builds
//! on.

pub mod derivation;
pub mod error;
pub mod hash;
pub mod key_image;
pub mod keys;
pub mod pow;
pub mod ring_signature;

pub use derivation::{derive_output_public_key, generate_key_derivation, KeyDerivation};
pub use error::CryptoError;
pub use hash::{fast_hash, tree_hash, Hash, HASH_SIZE};
pub use key_image::{generate_key_image, verify_key_image};
pub use keys::{hash_to_point, hash_to_scalar, PublicKey, SecretKey};
pub use pow::{long_hash, CryptoNightParams, CryptoNightVariant};
pub use ring_signature::{check_ring_signature, generate_ring_signature, prefix_hash, RingSignature};
