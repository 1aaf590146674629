//! RSA-OAEP key wrapping: recipient key import, wrap, unwrap, key pair generation
//!
//! Padding is OAEP with SHA-256 for both the label hash and MGF1, the
//! parameters WebCrypto uses for `{ name: "RSA-OAEP", hash: "SHA-256" }`.
//! A wrapped key is exactly one modulus long (256 bytes for RSA-2048).

use rand::rngs::StdRng;
use rand::SeedableRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::codec::{encode_pem, parse_pem, parse_pem_block, PRIVATE_KEY_LABEL, PUBLIC_KEY_LABEL};
use crate::entropy::{fill_array, EntropySource};
use crate::error::{CryptoError, CryptoResult};

/// OAEP overhead with SHA-256: two hash lengths plus two bytes.
const OAEP_SHA256_OVERHEAD: usize = 2 * 32 + 2;

const MIN_KEYGEN_BITS: usize = 1024;
const MAX_KEYGEN_BITS: usize = 4096;

/// A recipient's RSA public key, parsed from SPKI DER.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientPublicKey {
    inner: RsaPublicKey,
}

impl RecipientPublicKey {
    /// Parse a `BEGIN/END PUBLIC KEY` PEM block.
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        import_public_key(&parse_pem(pem)?)
    }

    /// Modulus length in bytes; also the length of every wrapped key.
    pub fn modulus_len(&self) -> usize {
        self.inner.size()
    }

    /// Largest symmetric key this modulus can wrap under OAEP-SHA-256.
    pub fn max_wrap_len(&self) -> usize {
        self.modulus_len().saturating_sub(OAEP_SHA256_OVERHEAD)
    }

    pub fn to_der(&self) -> CryptoResult<Vec<u8>> {
        self.inner
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| CryptoError::KeyFormat(format!("public key encoding: {e}")))
    }

    pub fn to_pem(&self) -> CryptoResult<String> {
        Ok(encode_pem(PUBLIC_KEY_LABEL, &self.to_der()?))
    }
}

/// A recipient's RSA private key, parsed from PKCS#8 DER. Zeroized on drop.
#[derive(Clone)]
pub struct RecipientPrivateKey {
    inner: RsaPrivateKey,
}

impl RecipientPrivateKey {
    /// Parse a `BEGIN/END PRIVATE KEY` (PKCS#8) PEM block.
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        let der = Zeroizing::new(parse_pem_block(pem, PRIVATE_KEY_LABEL)?);
        import_private_key(&der)
    }

    pub fn public_key(&self) -> RecipientPublicKey {
        RecipientPublicKey {
            inner: self.inner.to_public_key(),
        }
    }

    pub fn to_pem(&self) -> CryptoResult<Zeroizing<String>> {
        let der = self
            .inner
            .to_pkcs8_der()
            .map_err(|e| CryptoError::KeyFormat(format!("private key encoding: {e}")))?;
        Ok(Zeroizing::new(encode_pem(PRIVATE_KEY_LABEL, der.as_bytes())))
    }
}

impl std::fmt::Debug for RecipientPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipientPrivateKey")
            .field("modulus_bits", &(self.inner.size() * 8))
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// A freshly generated recipient key pair.
#[derive(Debug, Clone)]
pub struct RecipientKeyPair {
    pub public: RecipientPublicKey,
    pub private: RecipientPrivateKey,
}

/// Import an SPKI DER public key.
///
/// Fails with [`CryptoError::KeyFormat`] unless the DER describes an RSA key
/// (the only algorithm OAEP wrapping accepts).
pub fn import_public_key(der: &[u8]) -> CryptoResult<RecipientPublicKey> {
    let inner = RsaPublicKey::from_public_key_der(der)
        .map_err(|e| CryptoError::KeyFormat(format!("not an RSA SubjectPublicKeyInfo: {e}")))?;
    Ok(RecipientPublicKey { inner })
}

/// Import a PKCS#8 DER private key.
pub fn import_private_key(der: &[u8]) -> CryptoResult<RecipientPrivateKey> {
    let inner = RsaPrivateKey::from_pkcs8_der(der)
        .map_err(|e| CryptoError::KeyFormat(format!("not an RSA PKCS#8 private key: {e}")))?;
    Ok(RecipientPrivateKey { inner })
}

/// Wrap raw symmetric key bytes under `public` with RSA-OAEP(SHA-256).
///
/// The size limit is checked up front so an oversized key is reported as
/// [`CryptoError::KeySize`] instead of surfacing from the padding code.
pub fn wrap<E: EntropySource + ?Sized>(
    entropy: &E,
    key_bytes: &[u8],
    public: &RecipientPublicKey,
) -> CryptoResult<Vec<u8>> {
    let max = public.max_wrap_len();
    if key_bytes.len() > max {
        return Err(CryptoError::KeySize {
            max,
            actual: key_bytes.len(),
        });
    }

    let mut rng = seeded_rng(entropy)?;
    let wrapped = public
        .inner
        .encrypt(&mut rng, Oaep::new::<Sha256>(), key_bytes)
        .map_err(|e| CryptoError::InvalidInput(format!("RSA-OAEP wrap failed: {e}")))?;

    tracing::debug!(
        modulus_bits = public.modulus_len() * 8,
        wrapped_len = wrapped.len(),
        "wrapped symmetric key"
    );
    Ok(wrapped)
}

/// Recover the raw key bytes from an RSA-OAEP wrapped key.
///
/// Uses blinded decryption. Every failure, whatever its cause, is the same
/// [`CryptoError::Unwrap`].
pub fn unwrap<E: EntropySource + ?Sized>(
    entropy: &E,
    wrapped: &[u8],
    private: &RecipientPrivateKey,
) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let mut rng = seeded_rng(entropy)?;

    if wrapped.len() != private.inner.size() {
        return Err(CryptoError::Unwrap);
    }

    private
        .inner
        .decrypt_blinded(&mut rng, Oaep::new::<Sha256>(), wrapped)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::Unwrap)
}

/// Generate an RSA key pair with a `bits`-bit modulus (1024..=4096).
pub fn generate_keypair<E: EntropySource + ?Sized>(
    entropy: &E,
    bits: usize,
) -> CryptoResult<RecipientKeyPair> {
    if !(MIN_KEYGEN_BITS..=MAX_KEYGEN_BITS).contains(&bits) {
        return Err(CryptoError::InvalidInput(format!(
            "RSA modulus must be {MIN_KEYGEN_BITS}..={MAX_KEYGEN_BITS} bits, got {bits}"
        )));
    }

    let mut rng = seeded_rng(entropy)?;
    let inner = RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| CryptoError::KeyFormat(format!("RSA key generation failed: {e}")))?;
    let private = RecipientPrivateKey { inner };

    tracing::debug!(bits, "generated recipient key pair");
    Ok(RecipientKeyPair {
        public: private.public_key(),
        private,
    })
}

/// A CSPRNG for the RSA primitives, seeded from the injected source.
fn seeded_rng<E: EntropySource + ?Sized>(entropy: &E) -> CryptoResult<StdRng> {
    let seed = Zeroizing::new(fill_array::<32, E>(entropy)?);
    Ok(StdRng::from_seed(*seed))
}
