//! Zeroizing container for 32-byte symmetric keys.
//!
//! Pair keys (handshake output) and group keys (rekey output) share this
//! type. The bytes are wiped when the container is dropped.

use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroize;

/// Symmetric key size used throughout the engine.
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// A 32-byte symmetric key for XChaCha20-Poly1305.
#[derive(Clone)]
pub struct SymmetricKey {
    bytes: [u8; SYMMETRIC_KEY_SIZE],
}

impl SymmetricKey {
    /// Draw a fresh key from the given RNG.
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let mut bytes = [0u8; SYMMETRIC_KEY_SIZE];
        rng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Key bytes for the AEAD.
    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_SIZE] {
        &self.bytes
    }
}

impl From<[u8; SYMMETRIC_KEY_SIZE]> for SymmetricKey {
    fn from(bytes: [u8; SYMMETRIC_KEY_SIZE]) -> Self {
        Self { bytes }
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SymmetricKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;

    #[test]
    fn generate_produces_distinct_keys() {
        let a = SymmetricKey::generate(&mut OsRng);
        let b = SymmetricKey::generate(&mut OsRng);
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn from_bytes_round_trip() {
        let key = SymmetricKey::from([7u8; SYMMETRIC_KEY_SIZE]);
        assert_eq!(key.as_bytes(), &[7u8; SYMMETRIC_KEY_SIZE]);
    }

    #[test]
    fn debug_redacts() {
        let key = SymmetricKey::from([7u8; SYMMETRIC_KEY_SIZE]);
        assert_eq!(format!("{key:?}"), "SymmetricKey([REDACTED])");
    }
}
