//! Ed25519 signing and verification.
//!
//! The long-term identity of a member. Signs capsule transcripts and
//! handshake transcripts; verification failures are reported, never
//! panicked on.

use ed25519_dalek::{Signer as _, Verifier as _};
use rand_core::{CryptoRng, RngCore};

use crate::{CryptoError, Result};

/// Public key size.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Signature size.
pub const SIGNATURE_SIZE: usize = 64;

/// An Ed25519 signing key. The inner key zeroizes its seed on drop.
pub struct SigningKey {
    inner: ed25519_dalek::SigningKey,
}

/// An Ed25519 verification key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyingKey {
    inner: ed25519_dalek::VerifyingKey,
}

/// A detached Ed25519 signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    inner: ed25519_dalek::Signature,
}

impl SigningKey {
    /// Generate a fresh signing key from the given RNG.
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self { inner: ed25519_dalek::SigningKey::from_bytes(&seed) }
    }

    /// The corresponding verification key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey { inner: self.inner.verifying_key() }
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature { inner: self.inner.sign(message) }
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey").field("public", &self.verifying_key()).finish()
    }
}

impl VerifyingKey {
    /// Parse a verification key from raw bytes.
    ///
    /// # Errors
    ///
    /// `CryptoError::InvalidKey` if the bytes are not a valid curve point.
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_SIZE]) -> Result<Self> {
        let inner = ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { inner })
    }

    /// Raw key bytes.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.inner.to_bytes()
    }

    /// Verify a signature over a message.
    ///
    /// # Errors
    ///
    /// `CryptoError::SignatureVerification` if the signature is invalid.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        self.inner
            .verify(message, &signature.inner)
            .map_err(|_| CryptoError::SignatureVerification)
    }
}

impl Signature {
    /// Parse a signature from raw bytes.
    pub fn from_bytes(bytes: &[u8; SIGNATURE_SIZE]) -> Self {
        Self { inner: ed25519_dalek::Signature::from_bytes(bytes) }
    }

    /// Raw signature bytes.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE] {
        self.inner.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let key = SigningKey::generate(&mut OsRng);
        let sig = key.sign(b"capsule transcript");
        assert!(key.verifying_key().verify(b"capsule transcript", &sig).is_ok());
    }

    #[test]
    fn wrong_message_fails() {
        let key = SigningKey::generate(&mut OsRng);
        let sig = key.sign(b"original");
        assert_eq!(
            key.verifying_key().verify(b"forged", &sig),
            Err(CryptoError::SignatureVerification)
        );
    }

    #[test]
    fn wrong_key_fails() {
        let alice = SigningKey::generate(&mut OsRng);
        let mallory = SigningKey::generate(&mut OsRng);
        let sig = alice.sign(b"msg");
        assert!(mallory.verifying_key().verify(b"msg", &sig).is_err());
    }

    #[test]
    fn verifying_key_byte_round_trip() {
        let key = SigningKey::generate(&mut OsRng).verifying_key();
        let restored = VerifyingKey::from_bytes(&key.to_bytes()).unwrap();
        assert_eq!(key, restored);
    }

    #[test]
    fn signature_byte_round_trip() {
        let key = SigningKey::generate(&mut OsRng);
        let sig = key.sign(b"msg");
        assert_eq!(sig, Signature::from_bytes(&sig.to_bytes()));
    }
}
