//! Proof-of-work: the CryptoNight long-hash family and the table that
//! selects which variant applies to a given block.

mod aes;
pub mod cryptonight;
pub mod variants;

pub use cryptonight::long_hash;
pub use variants::{CryptoNightParams, CryptoNightVariant};
