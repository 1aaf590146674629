//! Injectable randomness for key, nonce and padding generation

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};

/// A cryptographically secure random source.
///
/// Production code uses [`OsEntropy`]. Tests substitute deterministic or
/// failing sources to exercise nonce handling and the entropy error path.
pub trait EntropySource: Send + Sync {
    /// Fill `dest` entirely with random bytes, or fail without partial output
    /// being used by the caller.
    fn fill(&self, dest: &mut [u8]) -> CryptoResult<()>;
}

/// The operating system CSPRNG (`getrandom`).
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, dest: &mut [u8]) -> CryptoResult<()> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| CryptoError::Entropy(e.to_string()))
    }
}

impl<E: EntropySource + ?Sized> EntropySource for &E {
    fn fill(&self, dest: &mut [u8]) -> CryptoResult<()> {
        (**self).fill(dest)
    }
}

/// Draw a fixed-size array from `entropy`.
pub(crate) fn fill_array<const N: usize, E: EntropySource + ?Sized>(
    entropy: &E,
) -> CryptoResult<[u8; N]> {
    let mut bytes = [0u8; N];
    entropy.fill(&mut bytes)?;
    Ok(bytes)
}


#[cfg(test)]
mod tests {
    use super::testing::{CountingEntropy, FailingEntropy};
    use super::*;

    #[test]
    fn test_os_entropy_fills() {
        let a: [u8; 32] = fill_array(&OsEntropy).unwrap();
        let b: [u8; 32] = fill_array(&OsEntropy).unwrap();
        assert_ne!(a, b, "two OS draws must differ");
    }

    #[test]
    fn test_counting_entropy_is_reproducible() {
        let a: [u8; 12] = fill_array(&CountingEntropy::default()).unwrap();
        let b: [u8; 12] = fill_array(&CountingEntropy::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_failing_entropy_propagates() {
        let result: CryptoResult<[u8; 12]> = fill_array(&FailingEntropy);
        assert!(matches!(result, Err(CryptoError::Entropy(_))));
    }
}
