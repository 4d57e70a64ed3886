//! Hearth Cryptographic Primitives
//!
//! Thin facade over the primitive crates used by the hearth engine. Each
//! module wraps exactly one concern:
//!
//! - [`aead`]: XChaCha20-Poly1305 authenticated encryption (24-byte nonce)
//! - [`hash`]: BLAKE3 keyed hashing with variable-length output
//! - [`ecdh`]: X25519 Diffie-Hellman key agreement
//! - [`kem`]: ML-KEM-512 key encapsulation (FIPS 203)
//! - [`sign`]: Ed25519 signatures
//! - [`b64`]: standard base64 with `=` padding, the wire encoding for all
//!   key and ciphertext fields
//! - [`keys`]: zeroizing 32-byte symmetric key container
//! - [`identity`]: a member's full key material (identity, ECDH, KEM)
//!
//! All functions are pure or take an explicit RNG. The engine injects
//! randomness through its environment abstraction, which keeps every
//! operation reproducible under a seeded RNG in tests.
//!
//! # Security
//!
//! - Secret-bearing buffers (signing keys, ECDH secrets, KEM decapsulation
//!   keys, derived symmetric keys) are zeroized on drop.
//! - AEAD failures, bad signatures, and malformed keys map to coarse error
//!   variants; callers decide whether to drop silently or surface.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

use thiserror::Error;

pub mod aead;
pub mod b64;
pub mod ecdh;
pub mod hash;
pub mod identity;
pub mod kem;
pub mod keys;
pub mod sign;

pub use identity::KeyMaterial;
pub use keys::{SymmetricKey, SYMMETRIC_KEY_SIZE};

/// Errors produced by the primitives facade.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// AEAD open failed: wrong key, wrong nonce, tampered ciphertext or AAD.
    #[error("aead authentication failed")]
    AeadAuthentication,

    /// A byte string had the wrong length for its role.
    #[error("invalid {what} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// What the bytes were supposed to be.
        what: &'static str,
        /// Required length.
        expected: usize,
        /// Observed length.
        actual: usize,
    },

    /// Base64 decoding failed.
    #[error("base64 decode failed")]
    Base64,

    /// A public key did not parse as a valid curve/lattice point.
    #[error("malformed public key")]
    InvalidKey,

    /// KEM encapsulation or decapsulation failed.
    #[error("kem operation failed")]
    Kem,

    /// Signature did not verify.
    #[error("signature verification failed")]
    SignatureVerification,
}

/// Convenience alias used throughout the facade.
pub type Result<T> = std::result::Result<T, CryptoError>;
