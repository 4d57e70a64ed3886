//! X25519 Diffie-Hellman key agreement.
//!
//! One ephemeral keypair per session; the shared point feeds the hybrid
//! pair-key derivation together with the ML-KEM shared secret.

use rand_core::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};

/// Public key size.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Shared secret size.
pub const SHARED_SECRET_SIZE: usize = 32;

/// An ephemeral X25519 secret. Zeroized on drop by the underlying type.
pub struct EcdhSecret {
    inner: StaticSecret,
}

impl EcdhSecret {
    /// Generate a fresh secret from the given RNG.
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        Self { inner: StaticSecret::random_from_rng(rng) }
    }

    /// The corresponding public key bytes.
    pub fn public(&self) -> [u8; PUBLIC_KEY_SIZE] {
        PublicKey::from(&self.inner).to_bytes()
    }

    /// Raw Diffie-Hellman with a peer's public key.
    pub fn agree(&self, peer_public: &[u8; PUBLIC_KEY_SIZE]) -> [u8; SHARED_SECRET_SIZE] {
        self.inner.diffie_hellman(&PublicKey::from(*peer_public)).to_bytes()
    }
}

impl std::fmt::Debug for EcdhSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcdhSecret").field("public", &crate::b64::encode(&self.public())).finish()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;

    #[test]
    fn agreement_is_symmetric() {
        let a = EcdhSecret::generate(&mut OsRng);
        let b = EcdhSecret::generate(&mut OsRng);

        assert_eq!(a.agree(&b.public()), b.agree(&a.public()));
    }

    #[test]
    fn different_peers_different_secrets() {
        let a = EcdhSecret::generate(&mut OsRng);
        let b = EcdhSecret::generate(&mut OsRng);
        let c = EcdhSecret::generate(&mut OsRng);

        assert_ne!(a.agree(&b.public()), a.agree(&c.public()));
    }

    #[test]
    fn debug_shows_public_only() {
        let a = EcdhSecret::generate(&mut OsRng);
        let rendered = format!("{a:?}");
        assert!(rendered.contains("public"));
    }
}
