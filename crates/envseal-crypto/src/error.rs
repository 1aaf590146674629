use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Failures of the envelope protocol.
///
/// `Authentication` and `Unwrap` carry no cause. A wrong key and tampered data
/// must be indistinguishable to the caller.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("base64 decode error: {0}")]
    Decode(String),

    #[error("PEM format error: {0}")]
    Format(String),

    #[error("entropy source unavailable: {0}")]
    Entropy(String),

    #[error("authentication failed")]
    Authentication,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported key: {0}")]
    KeyFormat(String),

    #[error("key too large for recipient modulus: {actual} bytes (maximum {max})")]
    KeySize { max: usize, actual: usize },

    #[error("key unwrap failed")]
    Unwrap,

    #[error("envelope header serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CryptoError {
    /// Only a missing entropy source is transient; everything else is a
    /// deterministic correctness failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CryptoError::Entropy(_))
    }
}
