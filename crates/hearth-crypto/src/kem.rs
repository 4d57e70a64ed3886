//! ML-KEM-512 key encapsulation (FIPS 203).
//!
//! The post-quantum half of the hybrid handshake. The host encapsulates
//! against each guest's encapsulation key and ships the ciphertext in a
//! `ct` frame; the guest decapsulates to recover the same shared secret.

use ml_kem::{
    kem::{Decapsulate, Encapsulate},
    Ciphertext, Encoded, EncodedSizeUser, KemCore, MlKem512,
};
use rand_core::CryptoRngCore;

use crate::{CryptoError, Result};

type DecapKey = <MlKem512 as KemCore>::DecapsulationKey;
type EncapKey = <MlKem512 as KemCore>::EncapsulationKey;

/// Encapsulation (public) key size for ML-KEM-512.
pub const ENCAP_KEY_SIZE: usize = 800;

/// Ciphertext size for ML-KEM-512.
pub const CIPHERTEXT_SIZE: usize = 768;

/// Shared secret size.
pub const SHARED_SECRET_SIZE: usize = 32;

/// A KEM keypair held for the lifetime of one session.
///
/// The decapsulation key never leaves this struct; only the encoded
/// encapsulation key is published.
pub struct KemKeyPair {
    decap: DecapKey,
    encap_bytes: Vec<u8>,
}

impl KemKeyPair {
    /// Generate a fresh keypair from the given RNG.
    pub fn generate(rng: &mut impl CryptoRngCore) -> Self {
        let (decap, encap) = MlKem512::generate(rng);

        let mut encap_bytes = vec![0u8; ENCAP_KEY_SIZE];
        encap_bytes.copy_from_slice(encap.as_bytes().as_ref());

        Self { decap, encap_bytes }
    }

    /// Encoded encapsulation key (800 bytes).
    pub fn public(&self) -> &[u8] {
        &self.encap_bytes
    }

    /// Recover the shared secret from a ciphertext produced against our
    /// encapsulation key.
    ///
    /// # Errors
    ///
    /// `CryptoError::InvalidLength` if the ciphertext is not 768 bytes,
    /// `CryptoError::Kem` if decapsulation rejects it.
    pub fn decapsulate(&self, ciphertext: &[u8]) -> Result<[u8; SHARED_SECRET_SIZE]> {
        let ct: Ciphertext<MlKem512> =
            ciphertext.try_into().map_err(|_| CryptoError::InvalidLength {
                what: "kem ciphertext",
                expected: CIPHERTEXT_SIZE,
                actual: ciphertext.len(),
            })?;

        let shared = self.decap.decapsulate(&ct).map_err(|_| CryptoError::Kem)?;

        let mut out = [0u8; SHARED_SECRET_SIZE];
        out.copy_from_slice(shared.as_ref());
        Ok(out)
    }
}

impl std::fmt::Debug for KemKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KemKeyPair {{ decap: [REDACTED], encap: {} bytes }}", self.encap_bytes.len())
    }
}

/// Encapsulate against a peer's encoded encapsulation key.
///
/// Returns `(ciphertext, shared_secret)`.
///
/// # Errors
///
/// `CryptoError::InvalidLength` if the key is not 800 bytes,
/// `CryptoError::InvalidKey` if it does not parse, `CryptoError::Kem` if
/// encapsulation fails.
pub fn encapsulate(
    encap_key: &[u8],
    rng: &mut impl CryptoRngCore,
) -> Result<(Vec<u8>, [u8; SHARED_SECRET_SIZE])> {
    let encoded: Encoded<EncapKey> = encap_key.try_into().map_err(|_| CryptoError::InvalidLength {
        what: "kem encapsulation key",
        expected: ENCAP_KEY_SIZE,
        actual: encap_key.len(),
    })?;
    let key = EncapKey::from_bytes(&encoded);

    let (ct, shared) = key.encapsulate(rng).map_err(|_| CryptoError::Kem)?;

    let mut ct_bytes = vec![0u8; CIPHERTEXT_SIZE];
    ct_bytes.copy_from_slice(ct.as_ref());

    let mut out = [0u8; SHARED_SECRET_SIZE];
    out.copy_from_slice(shared.as_ref());
    Ok((ct_bytes, out))
}
