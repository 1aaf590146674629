//! AES-256-GCM payload encryption/decryption
//!
//! Sealed payload format (binary):
//! ```text
//! nonce:      [12 bytes: random, generated inside encrypt()]
//! ciphertext: [N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! The nonce is never a caller input for encryption: every call draws a fresh
//! one from the entropy source, so two encryptions under the same key cannot
//! share a nonce through this API.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce as GcmNonce,
};
use zeroize::Zeroize;

use crate::entropy::{fill_array, EntropySource};
use crate::error::{CryptoError, CryptoResult};
use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// A per-envelope 256-bit symmetric key. Zeroized on drop.
#[derive(Clone)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidInput(format!(
                "symmetric key must be {KEY_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A 96-bit GCM nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; NONCE_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidInput(format!(
                "nonce must be {NONCE_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// Output of [`encrypt`]: the nonce it drew and the ciphertext with the tag appended.
#[derive(Debug, Clone)]
pub struct SealedPayload {
    pub nonce: Nonce,
    pub ciphertext: Vec<u8>,
}

/// Generate a random 256-bit symmetric key.
pub fn generate_key<E: EntropySource + ?Sized>(entropy: &E) -> CryptoResult<SymmetricKey> {
    let mut bytes: [u8; KEY_SIZE] = fill_array(entropy)?;
    let key = SymmetricKey::from_bytes(bytes);
    bytes.zeroize();
    Ok(key)
}

/// Encrypt `plaintext` with AES-256-GCM under a freshly drawn nonce.
///
/// Returns ciphertext of `plaintext.len() + TAG_SIZE` bytes.
pub fn encrypt<E: EntropySource + ?Sized>(
    entropy: &E,
    key: &SymmetricKey,
    plaintext: &[u8],
) -> CryptoResult<SealedPayload> {
    encrypt_with_aad(entropy, key, plaintext, &[])
}

/// [`encrypt`] with additional authenticated data bound into the tag.
///
/// The same `aad` must be presented to [`decrypt_with_aad`].
pub fn encrypt_with_aad<E: EntropySource + ?Sized>(
    entropy: &E,
    key: &SymmetricKey,
    plaintext: &[u8],
    aad: &[u8],
) -> CryptoResult<SealedPayload> {
    let nonce = Nonce::from_bytes(fill_array(entropy)?);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let ciphertext = cipher
        .encrypt(
            GcmNonce::from_slice(nonce.as_bytes()),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| {
            CryptoError::InvalidInput(format!(
                "plaintext of {} bytes exceeds the AES-GCM message limit",
                plaintext.len()
            ))
        })?;

    Ok(SealedPayload { nonce, ciphertext })
}

/// Decrypt and verify an AES-256-GCM ciphertext (tag appended).
///
/// Any tag mismatch (wrong key, wrong nonce, modified bytes) is reported as
/// [`CryptoError::Authentication`] and no plaintext is returned.
pub fn decrypt(key: &SymmetricKey, nonce: &Nonce, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    decrypt_with_aad(key, nonce, ciphertext, &[])
}

/// [`decrypt`] for ciphertexts produced by [`encrypt_with_aad`].
pub fn decrypt_with_aad(
    key: &SymmetricKey,
    nonce: &Nonce,
    ciphertext: &[u8],
    aad: &[u8],
) -> CryptoResult<Vec<u8>> {
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::InvalidInput(format!(
            "ciphertext too short: {} bytes (minimum {TAG_SIZE})",
            ciphertext.len()
        )));
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .decrypt(
            GcmNonce::from_slice(nonce.as_bytes()),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::Authentication)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::entropy::testing::{CountingEntropy, FailingEntropy};
    use crate::entropy::OsEntropy;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = generate_key(&OsEntropy).unwrap();
        let plaintext = b"hello, sealed world!";

        let sealed = encrypt(&OsEntropy, &key, plaintext).unwrap();
        let decrypted = decrypt(&key, &sealed.nonce, &sealed.ciphertext).unwrap();

        assert_eq!(&decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let key = generate_key(&OsEntropy).unwrap();

        let sealed = encrypt(&OsEntropy, &key, b"").unwrap();
        assert_eq!(sealed.ciphertext.len(), TAG_SIZE);

        let decrypted = decrypt(&key, &sealed.nonce, &sealed.ciphertext).unwrap();
        assert_eq!(decrypted, b"");
    }

    #[test]
    fn test_ciphertext_size() {
        let key = generate_key(&OsEntropy).unwrap();
        let plaintext = vec![0u8; 1000];

        let sealed = encrypt(&OsEntropy, &key, &plaintext).unwrap();

        // plaintext (1000) + tag (16) = 1016
        assert_eq!(sealed.ciphertext.len(), 1000 + TAG_SIZE);
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let key1 = generate_key(&OsEntropy).unwrap();
        let key2 = generate_key(&OsEntropy).unwrap();

        let sealed = encrypt(&OsEntropy, &key1, b"secret data").unwrap();
        let result = decrypt(&key2, &sealed.nonce, &sealed.ciphertext);

        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn test_decrypt_wrong_nonce() {
        let key = generate_key(&OsEntropy).unwrap();

        let sealed = encrypt(&OsEntropy, &key, b"secret data").unwrap();
        let mut nonce = *sealed.nonce.as_bytes();
        nonce[0] ^= 0x01;
        let result = decrypt(&key, &Nonce::from_bytes(nonce), &sealed.ciphertext);

        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn test_every_bit_flip_is_detected() {
        let key = generate_key(&OsEntropy).unwrap();
        let sealed = encrypt(&OsEntropy, &key, b"tamper me").unwrap();

        for byte in 0..sealed.ciphertext.len() {
            for bit in 0..8 {
                let mut tampered = sealed.ciphertext.clone();
                tampered[byte] ^= 1 << bit;
                let result = decrypt(&key, &sealed.nonce, &tampered);
                assert!(
                    matches!(result, Err(CryptoError::Authentication)),
                    "flip of byte {byte} bit {bit} went undetected"
                );
            }
        }
    }

    #[test]
    fn test_decrypt_too_short() {
        let key = generate_key(&OsEntropy).unwrap();
        let nonce = Nonce::from_bytes([0u8; NONCE_SIZE]);

        let result = decrypt(&key, &nonce, &[0u8; TAG_SIZE - 1]);
        assert!(matches!(result, Err(CryptoError::InvalidInput(_))));
    }

    #[test]
    fn test_nonces_unique_under_one_key() {
        let key = generate_key(&OsEntropy).unwrap();
        let mut seen = HashSet::new();

        for _ in 0..10_000 {
            let sealed = encrypt(&OsEntropy, &key, b"x").unwrap();
            assert!(seen.insert(sealed.nonce), "nonce reused");
        }
    }

    #[test]
    fn test_deterministic_entropy_is_reproducible() {
        let key = SymmetricKey::from_bytes([7u8; KEY_SIZE]);

        let a = encrypt(&CountingEntropy::default(), &key, b"same input").unwrap();
        let b = encrypt(&CountingEntropy::default(), &key, b"same input").unwrap();

        assert_eq!(a.nonce, b.nonce);
        assert_eq!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_generate_key_entropy_failure() {
        let result = generate_key(&FailingEntropy);
        assert!(matches!(result, Err(CryptoError::Entropy(_))));
    }

    #[test]
    fn test_encrypt_entropy_failure() {
        let key = SymmetricKey::from_bytes([7u8; KEY_SIZE]);
        let result = encrypt(&FailingEntropy, &key, b"data");
        assert!(matches!(result, Err(CryptoError::Entropy(_))));
    }

    #[test]
    fn test_aad_roundtrip_and_mismatch() {
        let key = generate_key(&OsEntropy).unwrap();
        let sealed = encrypt_with_aad(&OsEntropy, &key, b"payload", b"file-42").unwrap();

        let decrypted = decrypt_with_aad(&key, &sealed.nonce, &sealed.ciphertext, b"file-42").unwrap();
        assert_eq!(decrypted, b"payload");

        let result = decrypt_with_aad(&key, &sealed.nonce, &sealed.ciphertext, b"file-43");
        assert!(matches!(result, Err(CryptoError::Authentication)));

        let result = decrypt(&key, &sealed.nonce, &sealed.ciphertext);
        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn test_slice_constructors_check_length() {
        assert!(SymmetricKey::from_slice(&[0u8; KEY_SIZE]).is_ok());
        assert!(matches!(
            SymmetricKey::from_slice(&[0u8; 16]),
            Err(CryptoError::InvalidInput(_))
        ));
        assert!(Nonce::from_slice(&[0u8; NONCE_SIZE]).is_ok());
        assert!(matches!(
            Nonce::from_slice(&[0u8; 24]),
            Err(CryptoError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let key = SymmetricKey::from_bytes([0xAB; KEY_SIZE]);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("171"));
    }
}
