use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Not a valid curve point")]
    InvalidPoint,
    #[error("Not a valid scalar")]
    InvalidScalar,
    #[error("Ring signature length ({sig_len}) does not match ring size ({ring_len})")]
    RingSizeMismatch { sig_len: usize, ring_len: usize },
}
