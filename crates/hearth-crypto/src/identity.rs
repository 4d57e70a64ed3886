//! A member's session key material.
//!
//! One `KeyMaterial` per participant per session: a long-term-style
//! identity signing key plus ephemeral ECDH and KEM keypairs, all freshly
//! generated at session start and never persisted. The participant id is
//! likewise regenerated on every restart so sessions are unlinkable.

use rand_core::{CryptoRng, RngCore};

use crate::{b64, ecdh::EcdhSecret, kem::KemKeyPair, sign, Result};

/// Length of the random id drawn for `cid` (before base64).
const CID_RAW_LEN: usize = 9;

/// All key material a member holds for one session.
///
/// Secret halves are wiped when this struct is dropped; dropping it is the
/// teardown path for session key material.
pub struct KeyMaterial {
    cid: String,
    id: sign::SigningKey,
    x: EcdhSecret,
    kem: KemKeyPair,
}

impl KeyMaterial {
    /// Generate fresh material for a new session.
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let mut cid_bytes = [0u8; CID_RAW_LEN];
        rng.fill_bytes(&mut cid_bytes);

        Self {
            cid: b64::encode(&cid_bytes),
            id: sign::SigningKey::generate(rng),
            x: EcdhSecret::generate(rng),
            kem: KemKeyPair::generate(rng),
        }
    }

    /// This session's participant id.
    pub fn cid(&self) -> &str {
        &self.cid
    }

    /// Identity verification key.
    pub fn id_public(&self) -> sign::VerifyingKey {
        self.id.verifying_key()
    }

    /// Sign with the identity key.
    pub fn sign(&self, message: &[u8]) -> sign::Signature {
        self.id.sign(message)
    }

    /// Ephemeral ECDH public key.
    pub fn x_public(&self) -> [u8; 32] {
        self.x.public()
    }

    /// ECDH agreement with a peer's public key.
    pub fn ecdh_agree(&self, peer_public: &[u8; 32]) -> [u8; 32] {
        self.x.agree(peer_public)
    }

    /// Ephemeral KEM encapsulation key (800 bytes).
    pub fn pq_public(&self) -> &[u8] {
        self.kem.public()
    }

    /// Decapsulate a KEM ciphertext addressed to us.
    ///
    /// # Errors
    ///
    /// Propagates length and decapsulation failures from the KEM.
    pub fn kem_decapsulate(&self, ciphertext: &[u8]) -> Result<[u8; 32]> {
        self.kem.decapsulate(ciphertext)
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial").field("cid", &self.cid).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;

    #[test]
    fn cid_is_twelve_base64_chars() {
        let material = KeyMaterial::generate(&mut OsRng);
        assert_eq!(material.cid().len(), 12);
        assert!(b64::decode(material.cid()).is_ok());
    }

    #[test]
    fn fresh_material_every_session() {
        let a = KeyMaterial::generate(&mut OsRng);
        let b = KeyMaterial::generate(&mut OsRng);

        assert_ne!(a.cid(), b.cid());
        assert_ne!(a.id_public(), b.id_public());
        assert_ne!(a.x_public(), b.x_public());
        assert_ne!(a.pq_public(), b.pq_public());
    }

    #[test]
    fn hybrid_secrets_agree_across_members() {
        let host = KeyMaterial::generate(&mut OsRng);
        let guest = KeyMaterial::generate(&mut OsRng);

        // Classical half
        assert_eq!(host.ecdh_agree(&guest.x_public()), guest.ecdh_agree(&host.x_public()));

        // Post-quantum half
        let (ct, shared) = crate::kem::encapsulate(guest.pq_public(), &mut OsRng).unwrap();
        assert_eq!(guest.kem_decapsulate(&ct).unwrap(), shared);
    }
}
