//! envseal-crypto: client-side envelope encryption for a single file
//!
//! Architecture: Encrypt-then-Wrap
//!
//! Pipeline: plaintext → AES-256-GCM (fresh key, fresh nonce) → RSA-OAEP wrap key → base64 fields
//!
//! Envelope layout:
//! ```text
//! Symmetric Key (256-bit random, one per envelope)
//!   ├── Payload AEAD: AES-256-GCM (key=symmetric key, nonce=random_96bit, no AAD)
//!   │   └── cipherBlob = ciphertext || 16-byte tag
//!   └── Key material, one of:
//!       ├── Wrapped: RSA-OAEP(SHA-256) under the recipient public key
//!       └── Raw: the key itself, handed to the caller (explicit opt-in)
//! ```
//!
//! All randomness flows through an [`EntropySource`] so callers can inject
//! deterministic sources in tests.

pub mod cipher;
pub mod codec;
pub mod entropy;
pub mod envelope;
pub mod error;
pub mod wrap;

pub use cipher::{
    decrypt, decrypt_with_aad, encrypt, encrypt_with_aad, generate_key, Nonce, SealedPayload,
    SymmetricKey,
};
pub use codec::{decode_base64, encode_base64, encode_pem, parse_pem, parse_pem_block};
pub use entropy::{EntropySource, OsEntropy};
pub use envelope::{
    CiphertextEnvelope, EnvelopeBuilder, EnvelopeHeader, KeyForm, KeyMaterial, KeyProtection,
    PlaintextFile,
};
pub use error::{CryptoError, CryptoResult};
pub use wrap::{
    generate_keypair, import_private_key, import_public_key, unwrap, wrap, RecipientKeyPair,
    RecipientPrivateKey, RecipientPublicKey,
};

/// Size of a symmetric key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
