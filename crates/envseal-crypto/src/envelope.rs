//! Envelope assembly: encrypt a file, protect its key, encode for transport
//!
//! Wire format (JSON header + binary blob):
//! ```text
//! { "cid": "...", "ivB64": "<12-byte nonce>", "wrappedKeyB64": "<key material>", "keyForm": "wrapped" | "raw" }
//! cipherBlob = AES-256-GCM ciphertext || 16-byte tag
//! ```
//!
//! `keyForm` mirrors the [`KeyMaterial`] variant, which is the only place the
//! form is decided. Raw key material is only produced when the caller names
//! [`KeyProtection::ReturnRawKey`].

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::cipher::{decrypt, encrypt, generate_key, Nonce, SymmetricKey};
use crate::codec::{decode_base64, encode_base64};
use crate::entropy::{EntropySource, OsEntropy};
use crate::error::{CryptoError, CryptoResult};
use crate::wrap::{unwrap, wrap, RecipientPrivateKey, RecipientPublicKey};
use crate::{KEY_SIZE, TAG_SIZE};

/// A fully buffered input file. Zeroized when dropped.
pub struct PlaintextFile {
    data: Zeroizing<Vec<u8>>,
}

impl PlaintextFile {
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data: Zeroizing::new(data),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Vec<u8>> for PlaintextFile {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(data)
    }
}

impl std::fmt::Debug for PlaintextFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaintextFile")
            .field("len", &self.data.len())
            .finish()
    }
}

/// How the per-envelope symmetric key leaves [`EnvelopeBuilder::build_envelope`].
#[derive(Debug, Clone, Copy)]
pub enum KeyProtection<'a> {
    /// Wrap under the RSA public key in this PEM text.
    Recipient(&'a str),
    /// Wrap under an already parsed public key.
    RecipientKey(&'a RecipientPublicKey),
    /// Hand the raw key back to the caller, who becomes responsible for it.
    ///
    /// Anyone holding the envelope header can then decrypt the payload.
    ReturnRawKey,
}

/// Discriminator for the `wrappedKeyB64` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyForm {
    Raw,
    Wrapped,
}

/// The key material carried by an envelope, base64 encoded.
#[derive(Debug)]
pub enum KeyMaterial {
    /// The raw 256-bit key.
    Raw(SecretString),
    /// The key wrapped with RSA-OAEP for the recipient.
    Wrapped(String),
}

impl KeyMaterial {
    pub fn form(&self) -> KeyForm {
        match self {
            KeyMaterial::Raw(_) => KeyForm::Raw,
            KeyMaterial::Wrapped(_) => KeyForm::Wrapped,
        }
    }

    /// The base64 text, exposing the raw key when the form is `Raw`.
    pub fn expose_b64(&self) -> &str {
        match self {
            KeyMaterial::Raw(secret) => secret.expose_secret(),
            KeyMaterial::Wrapped(b64) => b64,
        }
    }
}

/// A self-contained encrypted file.
#[derive(Debug)]
pub struct CiphertextEnvelope {
    /// Caller-supplied identifier, passed through untouched.
    pub cid: Option<String>,
    /// Base64 of the 96-bit nonce.
    pub iv_b64: String,
    pub key_material: KeyMaterial,
    /// Ciphertext with the GCM tag appended.
    pub cipher_blob: Vec<u8>,
}

/// The text fields of an envelope as they travel in JSON.
///
/// For `Raw` envelopes `wrapped_key_b64` is the key itself, so the header is
/// zeroized on drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct EnvelopeHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(rename = "ivB64")]
    pub iv_b64: String,
    #[serde(rename = "wrappedKeyB64")]
    pub wrapped_key_b64: String,
    #[serde(rename = "keyForm")]
    #[zeroize(skip)]
    pub key_form: KeyForm,
}

impl CiphertextEnvelope {
    pub fn key_form(&self) -> KeyForm {
        self.key_material.form()
    }

    /// Decode the nonce field.
    pub fn nonce(&self) -> CryptoResult<Nonce> {
        Nonce::from_slice(&decode_base64(&self.iv_b64)?)
    }

    /// The JSON-facing header. For `Raw` envelopes this copies the raw key
    /// out of its secret wrapper; the copy is wiped when the header drops.
    pub fn header(&self) -> EnvelopeHeader {
        EnvelopeHeader {
            cid: self.cid.clone(),
            iv_b64: self.iv_b64.clone(),
            wrapped_key_b64: self.key_material.expose_b64().to_string(),
            key_form: self.key_form(),
        }
    }

    pub fn header_json(&self) -> CryptoResult<Zeroizing<String>> {
        Ok(Zeroizing::new(serde_json::to_string_pretty(&self.header())?))
    }

    /// Reassemble an envelope from its header and blob, validating field sizes.
    pub fn from_parts(mut header: EnvelopeHeader, cipher_blob: Vec<u8>) -> CryptoResult<Self> {
        Nonce::from_slice(&decode_base64(&header.iv_b64)?)?;

        let key_bytes = Zeroizing::new(decode_base64(&header.wrapped_key_b64)?);
        let key_material = match header.key_form {
            KeyForm::Raw => {
                if key_bytes.len() != KEY_SIZE {
                    return Err(CryptoError::InvalidInput(format!(
                        "raw key material must be {KEY_SIZE} bytes, got {}",
                        key_bytes.len()
                    )));
                }
                KeyMaterial::Raw(SecretString::from(std::mem::take(&mut header.wrapped_key_b64)))
            }
            KeyForm::Wrapped => {
                if key_bytes.is_empty() {
                    return Err(CryptoError::InvalidInput(
                        "wrapped key material is empty".into(),
                    ));
                }
                KeyMaterial::Wrapped(std::mem::take(&mut header.wrapped_key_b64))
            }
        };

        if cipher_blob.len() < TAG_SIZE {
            return Err(CryptoError::InvalidInput(format!(
                "cipher blob too short: {} bytes (minimum {TAG_SIZE})",
                cipher_blob.len()
            )));
        }

        Ok(Self {
            cid: header.cid.take(),
            iv_b64: std::mem::take(&mut header.iv_b64),
            key_material,
            cipher_blob,
        })
    }

    pub fn from_header_json(json: &str, cipher_blob: Vec<u8>) -> CryptoResult<Self> {
        let header: EnvelopeHeader = serde_json::from_str(json)?;
        Self::from_parts(header, cipher_blob)
    }
}

/// Builds and opens envelopes. Holds no state besides its entropy source, so
/// one builder can serve concurrent callers.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeBuilder<E = OsEntropy> {
    entropy: E,
}

impl EnvelopeBuilder<OsEntropy> {
    pub fn new() -> Self {
        Self { entropy: OsEntropy }
    }
}

impl<E: EntropySource> EnvelopeBuilder<E> {
    pub fn with_entropy(entropy: E) -> Self {
        Self { entropy }
    }

    /// Encrypt `file` under a fresh key and protect the key per `protection`.
    ///
    /// Any failure aborts the whole build; no partial envelope is returned.
    pub fn build_envelope(
        &self,
        file: PlaintextFile,
        cid: Option<String>,
        protection: KeyProtection<'_>,
    ) -> CryptoResult<CiphertextEnvelope> {
        let key = generate_key(&self.entropy)?;
        let sealed = encrypt(&self.entropy, &key, file.as_bytes())?;

        let key_material = match protection {
            KeyProtection::Recipient(pem) => {
                let public = RecipientPublicKey::from_pem(pem)?;
                KeyMaterial::Wrapped(encode_base64(&wrap(&self.entropy, key.as_bytes(), &public)?))
            }
            KeyProtection::RecipientKey(public) => {
                KeyMaterial::Wrapped(encode_base64(&wrap(&self.entropy, key.as_bytes(), public)?))
            }
            KeyProtection::ReturnRawKey => {
                tracing::warn!(
                    cid = cid.as_deref().unwrap_or("-"),
                    "envelope carries its raw key; caller must protect it"
                );
                KeyMaterial::Raw(SecretString::from(encode_base64(key.as_bytes())))
            }
        };
        drop(key);

        tracing::debug!(
            cid = cid.as_deref().unwrap_or("-"),
            plaintext_len = file.len(),
            key_form = ?key_material.form(),
            "built envelope"
        );

        Ok(CiphertextEnvelope {
            cid,
            iv_b64: encode_base64(sealed.nonce.as_bytes()),
            key_material,
            cipher_blob: sealed.ciphertext,
        })
    }

    /// Recover the plaintext of an envelope.
    ///
    /// `Wrapped` envelopes need the recipient's private key; `Raw` envelopes
    /// carry their own key and ignore it.
    pub fn open_envelope(
        &self,
        envelope: &CiphertextEnvelope,
        private: Option<&RecipientPrivateKey>,
    ) -> CryptoResult<Vec<u8>> {
        let nonce = envelope.nonce()?;

        let key = match &envelope.key_material {
            KeyMaterial::Raw(b64) => {
                let raw = Zeroizing::new(decode_base64(b64.expose_secret())?);
                SymmetricKey::from_slice(&raw)?
            }
            KeyMaterial::Wrapped(b64) => {
                let private = private.ok_or_else(|| {
                    CryptoError::InvalidInput(
                        "wrapped key material requires the recipient private key".into(),
                    )
                })?;
                let raw = unwrap(&self.entropy, &decode_base64(b64)?, private)?;
                SymmetricKey::from_slice(&raw).map_err(|_| CryptoError::Unwrap)?
            }
        };

        let plaintext = decrypt(&key, &nonce, &envelope.cipher_blob)?;
        tracing::debug!(
            cid = envelope.cid.as_deref().unwrap_or("-"),
            plaintext_len = plaintext.len(),
            "opened envelope"
        );
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use super::*;
    use crate::entropy::testing::{CountingEntropy, FailingEntropy};
    use crate::wrap::{generate_keypair, RecipientKeyPair};
    use crate::NONCE_SIZE;

    static TEST_PAIR: LazyLock<RecipientKeyPair> =
        LazyLock::new(|| generate_keypair(&OsEntropy, 1024).unwrap());

    fn hello() -> PlaintextFile {
        PlaintextFile::from_bytes(b"hello world".to_vec())
    }

    #[test]
    fn test_raw_envelope_roundtrip() {
        let builder = EnvelopeBuilder::new();
        let envelope = builder
            .build_envelope(hello(), None, KeyProtection::ReturnRawKey)
            .unwrap();

        assert_eq!(envelope.key_form(), KeyForm::Raw);
        assert_eq!(decode_base64(&envelope.iv_b64).unwrap().len(), NONCE_SIZE);
        assert_eq!(envelope.cipher_blob.len(), 11 + TAG_SIZE);
        assert_eq!(builder.open_envelope(&envelope, None).unwrap(), b"hello world");
    }

    #[test]
    fn test_wrapped_envelope_roundtrip() {
        let builder = EnvelopeBuilder::new();
        let envelope = builder
            .build_envelope(
                hello(),
                Some("cid-1".into()),
                KeyProtection::RecipientKey(&TEST_PAIR.public),
            )
            .unwrap();

        assert_eq!(envelope.key_form(), KeyForm::Wrapped);
        assert_eq!(envelope.cid.as_deref(), Some("cid-1"));
        assert_eq!(
            decode_base64(envelope.key_material.expose_b64()).unwrap().len(),
            128
        );

        let plaintext = builder
            .open_envelope(&envelope, Some(&TEST_PAIR.private))
            .unwrap();
        assert_eq!(plaintext, b"hello world");
    }

    #[test]
    fn test_wrapped_envelope_needs_private_key() {
        let builder = EnvelopeBuilder::new();
        let envelope = builder
            .build_envelope(hello(), None, KeyProtection::RecipientKey(&TEST_PAIR.public))
            .unwrap();

        let err = builder.open_envelope(&envelope, None).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidInput(_)));
    }

    #[test]
    fn test_bad_pem_aborts_build() {
        let builder = EnvelopeBuilder::new();
        let err = builder
            .build_envelope(hello(), None, KeyProtection::Recipient("not a pem"))
            .unwrap_err();
        assert!(matches!(err, CryptoError::Format(_)));
    }

    #[test]
    fn test_entropy_failure_aborts_build() {
        let builder = EnvelopeBuilder::with_entropy(FailingEntropy);
        let err = builder
            .build_envelope(hello(), None, KeyProtection::ReturnRawKey)
            .unwrap_err();
        assert!(matches!(err, CryptoError::Entropy(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_deterministic_entropy_reproduces_envelope() {
        let a = EnvelopeBuilder::with_entropy(CountingEntropy::default())
            .build_envelope(hello(), None, KeyProtection::ReturnRawKey)
            .unwrap();
        let b = EnvelopeBuilder::with_entropy(CountingEntropy::default())
            .build_envelope(hello(), None, KeyProtection::ReturnRawKey)
            .unwrap();

        assert_eq!(a.iv_b64, b.iv_b64);
        assert_eq!(a.cipher_blob, b.cipher_blob);
        assert_eq!(a.key_material.expose_b64(), b.key_material.expose_b64());
    }

    #[test]
    fn test_header_json_roundtrip() {
        let builder = EnvelopeBuilder::new();
        let envelope = builder
            .build_envelope(
                hello(),
                Some("QmFile".into()),
                KeyProtection::RecipientKey(&TEST_PAIR.public),
            )
            .unwrap();

        let json = envelope.header_json().unwrap();
        assert!(json.contains("\"ivB64\""));
        assert!(json.contains("\"wrappedKeyB64\""));
        assert!(json.contains("\"keyForm\": \"wrapped\""));

        let restored =
            CiphertextEnvelope::from_header_json(&json, envelope.cipher_blob.clone()).unwrap();
        assert_eq!(restored.header(), envelope.header());
        assert_eq!(
            builder
                .open_envelope(&restored, Some(&TEST_PAIR.private))
                .unwrap(),
            b"hello world"
        );
    }

    #[test]
    fn test_header_omits_missing_cid() {
        let envelope = EnvelopeBuilder::new()
            .build_envelope(hello(), None, KeyProtection::ReturnRawKey)
            .unwrap();
        assert!(!envelope.header_json().unwrap().contains("cid"));
    }

    #[test]
    fn test_from_parts_validates_sizes() {
        let good = EnvelopeHeader {
            cid: None,
            iv_b64: encode_base64(&[0u8; NONCE_SIZE]),
            wrapped_key_b64: encode_base64(&[0u8; KEY_SIZE]),
            key_form: KeyForm::Raw,
        };
        assert!(CiphertextEnvelope::from_parts(good.clone(), vec![0u8; TAG_SIZE]).is_ok());

        let mut short_iv = good.clone();
        short_iv.iv_b64 = encode_base64(&[0u8; 8]);
        assert!(matches!(
            CiphertextEnvelope::from_parts(short_iv, vec![0u8; TAG_SIZE]),
            Err(CryptoError::InvalidInput(_))
        ));

        let mut short_key = good.clone();
        short_key.wrapped_key_b64 = encode_base64(&[0u8; 16]);
        assert!(matches!(
            CiphertextEnvelope::from_parts(short_key, vec![0u8; TAG_SIZE]),
            Err(CryptoError::InvalidInput(_))
        ));

        let mut bad_b64 = good.clone();
        bad_b64.iv_b64 = "***".into();
        assert!(matches!(
            CiphertextEnvelope::from_parts(bad_b64, vec![0u8; TAG_SIZE]),
            Err(CryptoError::Decode(_))
        ));

        assert!(matches!(
            CiphertextEnvelope::from_parts(good, vec![0u8; TAG_SIZE - 1]),
            Err(CryptoError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_raw_header_copies_are_wiped() {
        let envelope = EnvelopeBuilder::new()
            .build_envelope(hello(), None, KeyProtection::ReturnRawKey)
            .unwrap();

        let json: Zeroizing<String> = envelope.header_json().unwrap();
        assert!(json.contains(envelope.key_material.expose_b64()));

        let mut header = envelope.header();
        assert_eq!(header.wrapped_key_b64, envelope.key_material.expose_b64());
        header.zeroize();
        assert!(header.wrapped_key_b64.is_empty());
        assert!(header.iv_b64.is_empty());
        assert_eq!(header.key_form, KeyForm::Raw);
    }

    #[test]
    fn test_raw_key_is_redacted_in_debug() {
        let envelope = EnvelopeBuilder::new()
            .build_envelope(hello(), None, KeyProtection::ReturnRawKey)
            .unwrap();
        let rendered = format!("{:?}", envelope.key_material);
        assert!(!rendered.contains(envelope.key_material.expose_b64()));
    }
}
